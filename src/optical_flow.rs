//! Sparse pyramidal Lucas-Kanade optical flow.

use glam::Vec2;
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a point went, and whether the estimate can be trusted. Invalid
/// points keep their input position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowResult {
    pub position: Vec2,
    pub valid: bool,
}

/// Propagates points from one frame into the next.
pub trait FlowPropagator {
    /// Returns exactly one result per input point, in input order.
    fn propagate(&self, prev: &GrayImage, next: &GrayImage, pts: &[Vec2]) -> Vec<FlowResult>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LkConfig {
    /// Half side of the integration window.
    pub win_size: u32,
    pub max_level: u32,
    pub max_iterations: u32,
    /// Stop iterating once the update is shorter than this, in pixels.
    pub epsilon: f32,
    /// Smallest accepted eigenvalue of the window's gradient matrix,
    /// normalized by window area, on intensities in `[0, 1]`.
    pub min_eigenvalue: f32,
}

impl Default for LkConfig {
    fn default() -> Self {
        Self {
            win_size: 4,
            max_level: 8,
            max_iterations: 10,
            epsilon: 0.01,
            min_eigenvalue: 1e-4,
        }
    }
}

struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(gray: &GrayImage) -> Plane {
        Plane {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data: gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect(),
        }
    }

    /// 2x2 box average.
    fn downsample(&self) -> Plane {
        let width = self.width / 2;
        let height = self.height / 2;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let r0 = 2 * y * self.width + 2 * x;
                let r1 = r0 + self.width;
                data.push(
                    (self.data[r0] + self.data[r0 + 1] + self.data[r1] + self.data[r1 + 1]) * 0.25,
                );
            }
        }
        Plane {
            width,
            height,
            data,
        }
    }

    fn at(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }

    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as i64, y0 as i64);
        let top = self.at(xi, yi) * (1.0 - fx) + self.at(xi + 1, yi) * fx;
        let bottom = self.at(xi, yi + 1) * (1.0 - fx) + self.at(xi + 1, yi + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

#[derive(Debug, Clone, Default)]
pub struct LucasKanade {
    config: LkConfig,
}

impl LucasKanade {
    pub fn new(config: LkConfig) -> LucasKanade {
        LucasKanade { config }
    }

    pub fn config(&self) -> &LkConfig {
        &self.config
    }

    fn pyramid(&self, gray: &GrayImage) -> Vec<Plane> {
        let min_side = 2 * (2 * self.config.win_size as usize + 1);
        let mut levels = vec![Plane::from_gray(gray)];
        while levels.len() <= self.config.max_level as usize {
            let Some(last) = levels.last() else { break };
            if last.width / 2 < min_side || last.height / 2 < min_side {
                break;
            }
            levels.push(last.downsample());
        }
        levels
    }

    fn track(&self, prev: &[Plane], next: &[Plane], pt: Vec2) -> FlowResult {
        let lost = FlowResult {
            position: pt,
            valid: false,
        };
        if !pt.is_finite() {
            return lost;
        }
        let w = self.config.win_size as i32;
        let area = ((2 * w + 1) * (2 * w + 1)) as f32;
        let levels = prev.len().min(next.len());
        let mut guess = Vec2::ZERO;
        let mut template = Vec::with_capacity(area as usize);

        for level in (0..levels).rev() {
            let p = pt / (1u32 << level) as f32;
            let (prev, next) = (&prev[level], &next[level]);

            template.clear();
            let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -w..=w {
                for dx in -w..=w {
                    let x = p.x + dx as f32;
                    let y = p.y + dy as f32;
                    let ix = (prev.sample(x + 1.0, y) - prev.sample(x - 1.0, y)) * 0.5;
                    let iy = (prev.sample(x, y + 1.0) - prev.sample(x, y - 1.0)) * 0.5;
                    gxx += ix * ix;
                    gxy += ix * iy;
                    gyy += iy * iy;
                    template.push((Vec2::new(dx as f32, dy as f32), ix, iy, prev.sample(x, y)));
                }
            }

            let det = gxx * gyy - gxy * gxy;
            let min_eig = (gxx + gyy - ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt()) / (2.0 * area);
            if min_eig < self.config.min_eigenvalue || det.abs() < f32::EPSILON {
                if level == 0 {
                    return lost;
                }
                guess *= 2.0;
                continue;
            }

            let mut v = Vec2::ZERO;
            for _ in 0..self.config.max_iterations {
                let (mut bx, mut by) = (0.0f32, 0.0f32);
                let base = p + guess + v;
                for &(offset, ix, iy, value) in &template {
                    let q = base + offset;
                    let diff = value - next.sample(q.x, q.y);
                    bx += diff * ix;
                    by += diff * iy;
                }
                let delta = Vec2::new((gyy * bx - gxy * by) / det, (gxx * by - gxy * bx) / det);
                if !delta.is_finite() {
                    return lost;
                }
                v += delta;
                if delta.length() < self.config.epsilon {
                    break;
                }
            }
            guess = if level == 0 { guess + v } else { (guess + v) * 2.0 };
        }

        let position = pt + guess;
        let (width, height) = (next[0].width as f32, next[0].height as f32);
        if !position.is_finite()
            || position.x < 0.0
            || position.y < 0.0
            || position.x > width - 1.0
            || position.y > height - 1.0
        {
            return lost;
        }
        FlowResult {
            position,
            valid: true,
        }
    }
}

impl FlowPropagator for LucasKanade {
    fn propagate(&self, prev: &GrayImage, next: &GrayImage, pts: &[Vec2]) -> Vec<FlowResult> {
        if pts.is_empty() {
            return Vec::new();
        }
        if prev.dimensions() != next.dimensions() || prev.width() == 0 || prev.height() == 0 {
            return pts
                .iter()
                .map(|&position| FlowResult {
                    position,
                    valid: false,
                })
                .collect();
        }
        let prev_pyramid = self.pyramid(prev);
        let next_pyramid = self.pyramid(next);
        pts.par_iter()
            .map(|&pt| self.track(&prev_pyramid, &next_pyramid, pt))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::textured_image;
    use image::{DynamicImage, Luma};

    fn smooth_texture(width: u32, height: u32) -> GrayImage {
        let gray = DynamicImage::ImageRgb8(textured_image(width, height, 11)).to_luma8();
        imageproc::filter::gaussian_blur_f32(&gray, 1.5)
    }

    fn shift(image: &GrayImage, dx: i32, dy: i32) -> GrayImage {
        let (w, h) = image.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let sx = (x as i32 - dx).clamp(0, w as i32 - 1) as u32;
            let sy = (y as i32 - dy).clamp(0, h as i32 - 1) as u32;
            *image.get_pixel(sx, sy)
        })
    }

    #[test]
    fn test_pyramid_depth_is_bounded() {
        let lk = LucasKanade::default();
        let levels = lk.pyramid(&GrayImage::new(320, 240));
        assert_eq!(levels.len(), 4);
        assert_eq!((levels[1].width, levels[1].height), (160, 120));
    }

    #[test]
    fn test_recovers_translation() {
        let prev = smooth_texture(240, 200);
        let next = shift(&prev, 3, 2);
        let pts: Vec<Vec2> = (0..8)
            .flat_map(|i| (0..6).map(move |j| Vec2::new(40.0 + 20.0 * i as f32, 40.0 + 20.0 * j as f32)))
            .collect();
        let results = LucasKanade::default().propagate(&prev, &next, &pts);
        assert_eq!(results.len(), pts.len());
        let good = results
            .iter()
            .zip(&pts)
            .filter(|(r, p)| r.valid && (r.position - **p - Vec2::new(3.0, 2.0)).length() < 0.3)
            .count();
        assert!(good * 10 >= pts.len() * 8, "only {good} of {} tracked", pts.len());
    }

    #[test]
    fn test_flat_image_is_untrackable() {
        let flat = GrayImage::from_pixel(120, 100, Luma([90]));
        let pts = [Vec2::new(50.0, 50.0), Vec2::new(10.0, 80.0)];
        let results = LucasKanade::default().propagate(&flat, &flat, &pts);
        for (r, p) in results.iter().zip(&pts) {
            assert!(!r.valid);
            assert_eq!(r.position, *p);
        }
    }

    #[test]
    fn test_points_outside_image_are_invalid() {
        let prev = smooth_texture(120, 100);
        let results = LucasKanade::default().propagate(&prev, &prev, &[Vec2::new(500.0, 20.0)]);
        assert!(!results[0].valid);
    }

    #[test]
    fn test_mismatched_sizes() {
        let a = GrayImage::new(64, 64);
        let b = GrayImage::new(32, 32);
        let results = LucasKanade::default().propagate(&a, &b, &[Vec2::new(5.0, 5.0)]);
        assert_eq!(results.len(), 1);
        assert!(!results[0].valid);
    }
}
