//! Raster primitives on top of `imageproc`, tolerant of shapes that leave
//! the canvas.

use glam::DVec2;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point;

use crate::types::{Homography, project_point};

/// Shapes reaching further than this many canvas sizes away are skipped.
const MAX_EXTENT: f64 = 8.0;

/// Maps marker pixels into the canvas, or `None` when any point goes to
/// infinity or absurdly far away.
pub(crate) fn to_canvas(h: &Homography, pts: &[DVec2], canvas: &RgbImage) -> Option<Vec<DVec2>> {
    let (w, h_px) = (canvas.width() as f64, canvas.height() as f64);
    let reach = MAX_EXTENT * w.max(h_px).max(1.0);
    pts.iter()
        .map(|p| {
            let q = project_point(h, *p)?;
            (q.x.abs() <= reach && q.y.abs() <= reach).then_some(q)
        })
        .collect()
}

fn ipt(p: DVec2) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

pub(crate) fn disc(canvas: &mut RgbImage, center: DVec2, radius: i32, color: Rgb<u8>) {
    draw_filled_circle_mut(canvas, ipt(center), radius.max(0), color);
}

/// Circle outline of the given thickness, centred on `radius`.
pub(crate) fn ring(canvas: &mut RgbImage, center: DVec2, radius: i32, thickness: i32, color: Rgb<u8>) {
    let c = ipt(center);
    let inner = radius - (thickness - 1) / 2;
    for r in inner..inner + thickness.max(1) {
        if r > 0 {
            draw_hollow_circle_mut(canvas, c, r, color);
        }
    }
}

/// Segment of the given thickness as parallel one-pixel lines.
fn thick_segment(canvas: &mut RgbImage, a: DVec2, b: DVec2, thickness: i32, color: Rgb<u8>) {
    let thickness = thickness.max(1);
    let normal = (b - a).perp().normalize_or_zero();
    for i in 0..thickness {
        let offset = normal * (i as f64 - (thickness - 1) as f64 / 2.0);
        let (s, e) = (a + offset, b + offset);
        draw_line_segment_mut(
            canvas,
            (s.x as f32, s.y as f32),
            (e.x as f32, e.y as f32),
            color,
        );
    }
}

pub(crate) fn polyline(
    canvas: &mut RgbImage,
    pts: &[DVec2],
    closed: bool,
    thickness: i32,
    color: Rgb<u8>,
) {
    for pair in pts.windows(2) {
        thick_segment(canvas, pair[0], pair[1], thickness, color);
    }
    if closed && pts.len() > 2 {
        thick_segment(canvas, pts[pts.len() - 1], pts[0], thickness, color);
    }
}

/// Fills a ring. Degenerate rings are ignored.
pub(crate) fn filled_polygon(canvas: &mut RgbImage, ring: &[DVec2], color: Rgb<u8>) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(ring.len());
    for p in ring {
        let (x, y) = ipt(*p);
        let q = Point::new(x, y);
        if poly.last() != Some(&q) {
            poly.push(q);
        }
    }
    // imageproc wants an open ring
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(canvas, &poly, color);
    }
}
