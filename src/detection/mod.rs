//! Oriented FAST + rotated BRIEF feature extraction over an image pyramid.

pub mod brief;
pub mod fast;

pub use brief::{BriefDescriptor, BriefExtractor};
pub use fast::FastDetector;

use glam::Vec2;
use image::GrayImage;
use image::imageops::{self, FilterType};
use log::trace;
use serde::{Deserialize, Serialize};

/// Nominal patch diameter of a level-0 keypoint.
const PATCH_SIZE: f32 = 31.0;
const ORIENTATION_RADIUS: i32 = 15;
const BLUR_SIGMA: f32 = 2.0;

/// A detected keypoint in level-0 pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub pt: Vec2,
    /// Patch diameter at level 0, grows with the pyramid level.
    pub size: f32,
    /// Orientation in radians.
    pub angle: f32,
    pub response: f32,
    pub octave: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: u32,
    pub fast_threshold: u8,
    pub nms_cell: u32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: 5000,
            scale_factor: 1.1,
            n_levels: 8,
            fast_threshold: 20,
            nms_cell: 8,
        }
    }
}

/// Anything that turns a grayscale image into keypoints with descriptors.
///
/// Both vectors have the same length; descriptor `i` belongs to keypoint `i`.
pub trait FeatureExtractor {
    fn detect_and_compute(&self, gray: &GrayImage) -> (Vec<KeyPoint>, Vec<BriefDescriptor>);
}

#[derive(Debug, Clone)]
pub struct OrbExtractor {
    config: OrbConfig,
    fast: FastDetector,
    brief: BriefExtractor,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new(OrbConfig::default())
    }
}

impl OrbExtractor {
    pub fn new(config: OrbConfig) -> OrbExtractor {
        let border = brief::PATCH_RADIUS.ceil() as u32;
        OrbExtractor {
            fast: FastDetector::new(config.fast_threshold, config.nms_cell, border),
            brief: BriefExtractor::new(),
            config,
        }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    /// Feature budget per level, shrinking geometrically like the level area.
    fn features_per_level(&self) -> Vec<usize> {
        let levels = self.config.n_levels.max(1) as usize;
        let factor = 1.0 / self.config.scale_factor.max(1.0 + f32::EPSILON);
        let n = self.config.n_features as f32;
        let mut per_level = Vec::with_capacity(levels);
        let mut desired = n * (1.0 - factor) / (1.0 - factor.powi(levels as i32));
        let mut total = 0usize;
        for _ in 0..levels - 1 {
            let count = desired.round() as usize;
            per_level.push(count);
            total += count;
            desired *= factor;
        }
        per_level.push(self.config.n_features.saturating_sub(total));
        per_level
    }

    fn pyramid(&self, gray: &GrayImage) -> Vec<(f32, GrayImage)> {
        let mut levels = vec![(1.0f32, gray.clone())];
        let min_side = 2 * brief::PATCH_RADIUS as u32 + 1;
        for level in 1..self.config.n_levels.max(1) {
            let scale = self.config.scale_factor.powi(level as i32);
            let w = (gray.width() as f32 / scale).round() as u32;
            let h = (gray.height() as f32 / scale).round() as u32;
            if w < min_side || h < min_side {
                break;
            }
            levels.push((scale, imageops::resize(gray, w, h, FilterType::Triangle)));
        }
        levels
    }
}

impl FeatureExtractor for OrbExtractor {
    fn detect_and_compute(&self, gray: &GrayImage) -> (Vec<KeyPoint>, Vec<BriefDescriptor>) {
        let budgets = self.features_per_level();
        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();

        for (octave, (scale, image)) in self.pyramid(gray).into_iter().enumerate() {
            let smoothed = imageproc::filter::gaussian_blur_f32(&image, BLUR_SIGMA);
            let mut kept = 0;
            for corner in self.fast.detect(&image) {
                if kept >= budgets[octave] {
                    break;
                }
                let (x, y) = (corner.x as f32, corner.y as f32);
                let angle = fast::intensity_centroid_angle(&image, x, y, ORIENTATION_RADIUS);
                let Some(descriptor) = self.brief.compute(&smoothed, x, y, angle) else {
                    continue;
                };
                keypoints.push(KeyPoint {
                    pt: Vec2::new(x * scale, y * scale),
                    size: PATCH_SIZE * scale,
                    angle,
                    response: corner.response,
                    octave: octave as u32,
                });
                descriptors.push(descriptor);
                kept += 1;
            }
            trace!("octave {} kept {} keypoints", octave, kept);
        }
        (keypoints, descriptors)
    }
}
