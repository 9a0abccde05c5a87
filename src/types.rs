use glam::DVec2;
use nalgebra as na;

/// Projective transform from marker pixels to frame pixels.
pub type Homography = na::Matrix3<f64>;

/// Maps `p` through `h`. Returns `None` for points sent to infinity.
pub fn project_point(h: &Homography, p: DVec2) -> Option<DVec2> {
    let v = h * na::Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < 1e-12 {
        return None;
    }
    let out = DVec2::new(v.x / v.z, v.y / v.z);
    if out.is_finite() { Some(out) } else { None }
}

/// Maps every point or fails as a whole.
pub fn project_points(h: &Homography, pts: &[DVec2]) -> Option<Vec<DVec2>> {
    pts.iter().map(|p| project_point(h, *p)).collect()
}

pub fn project_vec2(h: &Homography, p: glam::Vec2) -> Option<glam::Vec2> {
    project_point(h, p.as_dvec2()).map(|q| q.as_vec2())
}

/// Scales `h` so that `h[(2, 2)] == 1`, when possible.
pub fn normalize_homography(h: &Homography) -> Homography {
    let s = h[(2, 2)];
    if s.abs() < 1e-15 { *h } else { h / s }
}

/// A homography is usable when it is finite and invertible.
pub fn is_valid_homography(h: &Homography) -> bool {
    h.iter().all(|v| v.is_finite()) && h.determinant().abs() > 1e-12
}

/// Pure translation, handy for building synthetic motion.
pub fn translation(tx: f64, ty: f64) -> Homography {
    na::Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0)
}
