use glam::{DVec2, Vec2};
use image::{GrayImage, RgbImage, imageops};

use crate::detection::{BriefDescriptor, FeatureExtractor, KeyPoint};

/// One video frame (or the marker) and what the tracker learned about it.
#[derive(Debug, Clone)]
pub struct FrameFeature {
    pub image: RgbImage,
    pub gray: GrayImage,
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<BriefDescriptor>,
    /// Points handed to optical flow on the next frame.
    pub points: Vec<Vec2>,
    /// Points believed to lie on the marker in this frame.
    pub matched_points: Vec<Vec2>,
}

impl FrameFeature {
    /// Grayscale conversion only; detection is deferred.
    pub fn new(image: &RgbImage) -> FrameFeature {
        let gray = imageops::grayscale(image);
        FrameFeature {
            image: image.clone(),
            gray,
            keypoints: Vec::new(),
            descriptors: Vec::new(),
            points: Vec::new(),
            matched_points: Vec::new(),
        }
    }

    pub fn detect_and_compute(&mut self, extractor: &impl FeatureExtractor) {
        let (keypoints, descriptors) = extractor.detect_and_compute(&self.gray);
        self.keypoints = keypoints;
        self.descriptors = descriptors;
    }

    pub fn keypoint_positions(&self) -> Vec<Vec2> {
        self.keypoints.iter().map(|k| k.pt).collect()
    }

    pub fn img_w_h(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub(crate) fn to_dvec2(pts: &[Vec2]) -> Vec<DVec2> {
    pts.iter().map(|p| p.as_dvec2()).collect()
}
