//! Rotated BRIEF: 256 intensity comparisons steered by the keypoint angle.

use image::GrayImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Sample offsets stay inside this radius so that any rotation fits in
/// [`PATCH_RADIUS`].
const PATTERN_RADIUS: f32 = 11.0;
pub const PATCH_RADIUS: f32 = 16.0;
const PATTERN_SEED: u64 = 0x0b5e_55ed;

/// A 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BriefDescriptor(pub [u64; 4]);

impl BriefDescriptor {
    pub fn hamming_distance(&self, other: &BriefDescriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct BriefExtractor {
    pattern: Vec<[f32; 4]>,
}

impl Default for BriefExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor {
    /// The pattern is drawn once from a fixed seed so descriptors are
    /// comparable across runs and instances.
    pub fn new() -> BriefExtractor {
        let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
        let mut sample = || loop {
            // sum of two uniforms: a cheap bell shape around the centre
            let x = (rng.random_range(-1.0f32..1.0) + rng.random_range(-1.0f32..1.0)) * 0.5;
            let y = (rng.random_range(-1.0f32..1.0) + rng.random_range(-1.0f32..1.0)) * 0.5;
            if x * x + y * y <= 1.0 {
                return (x * PATTERN_RADIUS, y * PATTERN_RADIUS);
            }
        };
        let pattern = (0..256)
            .map(|_| {
                let (x1, y1) = sample();
                let (x2, y2) = sample();
                [x1, y1, x2, y2]
            })
            .collect();
        BriefExtractor { pattern }
    }

    /// Descriptor of the patch around `(x, y)` rotated by `angle`, or `None`
    /// when the patch leaves the image. `image` should already be smoothed.
    pub fn compute(&self, image: &GrayImage, x: f32, y: f32, angle: f32) -> Option<BriefDescriptor> {
        let (width, height) = image.dimensions();
        if x < PATCH_RADIUS
            || y < PATCH_RADIUS
            || x >= width as f32 - PATCH_RADIUS
            || y >= height as f32 - PATCH_RADIUS
        {
            return None;
        }

        let (sin_a, cos_a) = angle.sin_cos();
        let sample = |dx: f32, dy: f32| {
            let px = (x + dx * cos_a - dy * sin_a).round() as u32;
            let py = (y + dx * sin_a + dy * cos_a).round() as u32;
            image.get_pixel(px, py).0[0]
        };

        let mut bits = [0u64; 4];
        for (i, &[x1, y1, x2, y2]) in self.pattern.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                bits[i / 64] |= 1 << (i % 64);
            }
        }
        Some(BriefDescriptor(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_hamming_distance() {
        let a = BriefDescriptor([0, 0, 0, 0]);
        let b = BriefDescriptor([u64::MAX, 0, 1, 0]);
        assert_eq!(a.hamming_distance(&a), 0);
        assert_eq!(a.hamming_distance(&b), 65);
    }

    #[test]
    fn test_pattern_is_deterministic() {
        let a = BriefExtractor::new();
        let b = BriefExtractor::new();
        assert_eq!(a.pattern, b.pattern);
        assert_eq!(a.pattern.len(), 256);
        for p in &a.pattern {
            assert!(p.iter().all(|v| v.abs() <= PATTERN_RADIUS));
        }
    }

    #[test]
    fn test_border_rejected() {
        let extractor = BriefExtractor::new();
        let image = GrayImage::new(100, 100);
        assert!(extractor.compute(&image, 5.0, 50.0, 0.0).is_none());
        assert!(extractor.compute(&image, 50.0, 95.0, 0.0).is_none());
        assert!(extractor.compute(&image, 50.0, 50.0, 1.0).is_some());
    }

    #[test]
    fn test_rotation_changes_descriptor() {
        let extractor = BriefExtractor::new();
        let mut image = GrayImage::new(100, 100);
        for y in 0..100 {
            for x in 0..100 {
                image.put_pixel(x, y, Luma([if x > 50 { 200 } else { 40 }]));
            }
        }
        let d0 = extractor.compute(&image, 50.0, 50.0, 0.0).unwrap();
        let d1 = extractor
            .compute(&image, 50.0, 50.0, std::f32::consts::FRAC_PI_2)
            .unwrap();
        assert_ne!(d0, d1);
    }
}
