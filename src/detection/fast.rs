//! FAST-9 corners scored by Harris response, thinned with a grid.

use image::GrayImage;

/// Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const HARRIS_K: f32 = 0.04;

/// A corner found on one pyramid level, in that level's pixels.
#[derive(Debug, Clone, Copy)]
pub struct Corner {
    pub x: u32,
    pub y: u32,
    pub response: f32,
}

#[derive(Debug, Clone)]
pub struct FastDetector {
    threshold: u8,
    /// Side of the square cells used for non-maximum suppression.
    nms_cell: u32,
    /// Corners closer than this to the border are ignored.
    border: u32,
}

impl FastDetector {
    pub fn new(threshold: u8, nms_cell: u32, border: u32) -> FastDetector {
        FastDetector {
            threshold,
            nms_cell: nms_cell.max(1),
            border: border.max(3),
        }
    }

    /// Strongest corner of every grid cell, sorted by descending response.
    pub fn detect(&self, image: &GrayImage) -> Vec<Corner> {
        let (width, height) = image.dimensions();
        if width <= 2 * self.border || height <= 2 * self.border {
            return Vec::new();
        }

        let cols = width.div_ceil(self.nms_cell) as usize;
        let rows = height.div_ceil(self.nms_cell) as usize;
        let mut grid: Vec<Option<Corner>> = vec![None; cols * rows];

        for y in self.border..height - self.border {
            for x in self.border..width - self.border {
                if !self.is_corner(image, x, y) {
                    continue;
                }
                let response = harris_response(image, x, y);
                let cell = (y / self.nms_cell) as usize * cols + (x / self.nms_cell) as usize;
                match grid[cell] {
                    Some(best) if best.response >= response => {}
                    _ => grid[cell] = Some(Corner { x, y, response }),
                }
            }
        }

        let mut corners: Vec<Corner> = grid.into_iter().flatten().collect();
        corners.sort_by(|a, b| b.response.total_cmp(&a.response));
        corners
    }

    fn is_corner(&self, image: &GrayImage, x: u32, y: u32) -> bool {
        let center = image.get_pixel(x, y).0[0] as i16;
        let t = self.threshold as i16;
        let at = |i: usize| {
            let (dx, dy) = CIRCLE[i];
            image
                .get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)
                .0[0] as i16
        };

        // any arc of 9 covers at least 2 of the 4 compass points
        let compass = [at(0), at(4), at(8), at(12)];
        let brighter = compass.iter().filter(|&&p| p > center + t).count();
        let darker = compass.iter().filter(|&&p| p < center - t).count();
        if brighter < 2 && darker < 2 {
            return false;
        }

        let ring: [i16; 16] = std::array::from_fn(at);
        longest_arc(&ring, |p| p > center + t) >= 9 || longest_arc(&ring, |p| p < center - t) >= 9
    }
}

/// Longest run of contiguous ring pixels satisfying `pred`, with wrap-around.
fn longest_arc(ring: &[i16; 16], pred: impl Fn(i16) -> bool) -> usize {
    let mut run = 0;
    let mut best = 0;
    for i in 0..32 {
        if pred(ring[i % 16]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

/// det(M) - k trace(M)^2 over a 7x7 window of central differences.
fn harris_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let (width, height) = image.dimensions();
    let value = |px: u32, py: u32| image.get_pixel(px, py).0[0] as f32;

    let mut sxx = 0.0f32;
    let mut syy = 0.0f32;
    let mut sxy = 0.0f32;
    for dy in -3i32..=3 {
        for dx in -3i32..=3 {
            let px = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
            let py = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
            let ix = (value((px + 1).min(width - 1), py) - value(px.saturating_sub(1), py)) / 2.0;
            let iy = (value(px, (py + 1).min(height - 1)) - value(px, py.saturating_sub(1))) / 2.0;
            sxx += ix * ix;
            syy += iy * iy;
            sxy += ix * iy;
        }
    }
    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    det - HARRIS_K * trace * trace
}

/// Angle of the intensity centroid inside a disc of `radius`.
pub fn intensity_centroid_angle(image: &GrayImage, x: f32, y: f32, radius: i32) -> f32 {
    let (width, height) = image.dimensions();
    let cx = x.round() as i32;
    let cy = y.round() as i32;
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let px = cx + dx;
            let py = cy + dy;
            if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                continue;
            }
            let v = image.get_pixel(px as u32, py as u32).0[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}
