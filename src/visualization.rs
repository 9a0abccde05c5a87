use std::io::Cursor;

use glam::{DVec2, Vec2};
use image::RgbImage;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::{RecordingStream, TimeCell};

use crate::detected_points::FrameFeature;
use crate::types::{Homography, project_points};

pub type VisResult = Result<(), Box<dyn std::error::Error>>;

pub fn set_frame(recording: &RecordingStream, frame_idx: u64) {
    recording.set_time("frame", TimeCell::from_sequence(frame_idx as i64));
}

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &RgbImage,
    format: image::ImageFormat,
) -> VisResult {
    let mut bytes: Vec<u8> = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format)?;
    recording.log(
        format!("{}/image", topic),
        &rerun::Image::from_file_contents(bytes, None)?,
    )?;
    Ok(())
}

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[Vec2]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|p| (p.x + 0.5, p.y + 0.5)).collect()
}

/// Flow points in green, points matched to the marker in their own colour.
pub fn log_tracked_points(recording: &RecordingStream, topic: &str, frame: &FrameFeature) -> VisResult {
    recording.log(
        format!("{}/flow", topic),
        &rerun::Points2D::new(rerun_shift(&frame.points))
            .with_colors([(0, 255, 0, 255)])
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    )?;
    let colors: Vec<_> = (0..frame.matched_points.len()).map(id_to_color).collect();
    recording.log(
        format!("{}/matched", topic),
        &rerun::Points2D::new(rerun_shift(&frame.matched_points))
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(4.0)]),
    )?;
    Ok(())
}

/// Outline of the marker in the frame, or a cleared entity when lost.
pub fn log_marker_outline(
    recording: &RecordingStream,
    topic: &str,
    marker_size: (u32, u32),
    homography: Option<&Homography>,
) -> VisResult {
    let path = format!("{}/marker", topic);
    let (w, h) = (marker_size.0 as f64, marker_size.1 as f64);
    let corners = [
        DVec2::ZERO,
        DVec2::new(w, 0.0),
        DVec2::new(w, h),
        DVec2::new(0.0, h),
        DVec2::ZERO,
    ];
    match homography.and_then(|hm| project_points(hm, &corners)) {
        Some(pts) => {
            let strip: Vec<Vec2> = pts.iter().map(|p| p.as_vec2()).collect();
            recording.log(
                path,
                &rerun::LineStrips2D::new([rerun_shift(&strip)]).with_colors([(0, 255, 0, 255)]),
            )?;
        }
        None => recording.log(path, &rerun::Clear::flat())?,
    }
    Ok(())
}
