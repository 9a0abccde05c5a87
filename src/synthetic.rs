//! Synthetic imagery: textured markers and perspective warps of them.

use glam::DVec2;
use image::{Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::{Homography, project_point, translation};

const BLOCK: u32 = 4;

/// Deterministic block noise with plenty of corners.
pub fn textured_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let cols = width.div_ceil(BLOCK);
    let rows = height.div_ceil(BLOCK);
    let blocks: Vec<Rgb<u8>> = (0..cols * rows)
        .map(|_| {
            let v: u8 = rng.random();
            let tint: u8 = rng.random_range(0..48);
            Rgb([v, v.saturating_sub(tint), v.saturating_add(tint / 2)])
        })
        .collect();
    RgbImage::from_fn(width, height, |x, y| {
        blocks[((y / BLOCK) * cols + x / BLOCK) as usize]
    })
}

fn sample_bilinear(image: &RgbImage, p: DVec2) -> Option<Rgb<u8>> {
    let (w, h) = image.dimensions();
    if p.x < 0.0 || p.y < 0.0 || p.x > (w - 1) as f64 || p.y > (h - 1) as f64 {
        return None;
    }
    let x0 = p.x.floor() as u32;
    let y0 = p.y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = p.x - x0 as f64;
    let fy = p.y - y0 as f64;
    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let v00 = image.get_pixel(x0, y0).0[c] as f64;
        let v10 = image.get_pixel(x1, y0).0[c] as f64;
        let v01 = image.get_pixel(x0, y1).0[c] as f64;
        let v11 = image.get_pixel(x1, y1).0[c] as f64;
        let top = v00 * (1.0 - fx) + v10 * fx;
        let bottom = v01 * (1.0 - fx) + v11 * fx;
        *o = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Some(Rgb(out))
}

/// Renders `src` seen through `h` (source pixels to output pixels) onto a
/// `width` x `height` canvas filled with `background`.
pub fn warp_perspective(
    src: &RgbImage,
    h: &Homography,
    width: u32,
    height: u32,
    background: Rgb<u8>,
) -> RgbImage {
    let Some(h_inv) = h.try_inverse() else {
        return RgbImage::from_pixel(width, height, background);
    };
    RgbImage::from_par_fn(width, height, |x, y| {
        project_point(&h_inv, DVec2::new(x as f64, y as f64))
            .and_then(|p| sample_bilinear(src, p))
            .unwrap_or(background)
    })
}

/// Smooth marker motion for `t` in `[0, 1)`: the marker drifts around the
/// canvas centre while rotating, zooming and tilting slightly.
pub fn orbit_homography(marker: (u32, u32), canvas: (u32, u32), t: f64) -> Homography {
    let (mw, mh) = (marker.0 as f64, marker.1 as f64);
    let (cw, ch) = (canvas.0 as f64, canvas.1 as f64);
    let phase = std::f64::consts::TAU * t;

    let scale = 0.6 * (cw / mw).min(ch / mh) * (1.0 + 0.1 * phase.sin());
    let angle = 0.15 * phase.sin();
    let center = DVec2::new(
        cw / 2.0 + 0.1 * cw * phase.cos(),
        ch / 2.0 + 0.08 * ch * (2.0 * phase).sin(),
    );
    let (sin, cos) = angle.sin_cos();
    let rotate_scale = Homography::new(
        scale * cos,
        -scale * sin,
        0.0,
        scale * sin,
        scale * cos,
        0.0,
        0.0,
        0.0,
        1.0,
    );
    let tilt = Homography::new(
        1.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        1e-4 * phase.sin(),
        5e-5 * phase.cos(),
        1.0,
    );
    translation(center.x, center.y) * tilt * rotate_scale * translation(-mw / 2.0, -mh / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textured_image_is_seeded() {
        let a = textured_image(64, 48, 3);
        let b = textured_image(64, 48, 3);
        let c = textured_image(64, 48, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_identity_warp() {
        let src = textured_image(40, 30, 1);
        let out = warp_perspective(&src, &Homography::identity(), 40, 30, Rgb([0, 0, 0]));
        assert_eq!(src, out);
    }

    #[test]
    fn test_integer_translation_warp() {
        let src = textured_image(40, 30, 1);
        let out = warp_perspective(&src, &translation(5.0, 3.0), 60, 50, Rgb([1, 2, 3]));
        assert_eq!(out.get_pixel(5 + 10, 3 + 7), src.get_pixel(10, 7));
        assert_eq!(*out.get_pixel(0, 0), Rgb([1, 2, 3]));
    }

    #[test]
    fn test_orbit_keeps_marker_centred_and_periodic() {
        let h0 = orbit_homography((200, 100), (640, 480), 0.0);
        let h1 = orbit_homography((200, 100), (640, 480), 1.0);
        assert!((h0 - h1).abs().max() < 1e-9);

        let c = project_point(&h0, DVec2::new(100.0, 50.0)).unwrap();
        assert!((c - DVec2::new(320.0 + 64.0, 240.0)).length() < 1e-6);
        for t in [0.1, 0.35, 0.8] {
            let h = orbit_homography((200, 100), (640, 480), t);
            for corner in [DVec2::ZERO, DVec2::new(200.0, 100.0)] {
                let p = project_point(&h, corner).unwrap();
                assert!(p.x > 0.0 && p.x < 640.0 && p.y > 0.0 && p.y < 480.0);
            }
        }
    }
}
