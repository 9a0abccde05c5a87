use faer::linalg::solvers::SolveLstsqCore;
use glam::DVec2;
use nalgebra as na;

/// Least-squares affine map `src -> dst`, returned as a 3x3 matrix with
/// bottom row `[0, 0, 1]`. Needs at least 3 pairs not all on one line.
pub fn fit_affine(src: &[DVec2], dst: &[DVec2]) -> Option<na::Matrix3<f64>> {
    let n = src.len();
    if n < 3 || n != dst.len() || spread(src) <= 1e-12 {
        return None;
    }

    let a: faer::Mat<f64> = faer::Mat::from_fn(n, 3, |r, c| match c {
        0 => src[r].x,
        1 => src[r].y,
        _ => 1.0,
    });
    let mut x: faer::Mat<f64> =
        faer::Mat::from_fn(n, 2, |r, c| if c == 0 { dst[r].x } else { dst[r].y });
    a.qr()
        .solve_lstsq_in_place_with_conj(faer::Conj::No, x.as_mut());

    let m = na::Matrix3::new(
        *x.get(0, 0),
        *x.get(1, 0),
        *x.get(2, 0),
        *x.get(0, 1),
        *x.get(1, 1),
        *x.get(2, 1),
        0.0,
        0.0,
        1.0,
    );
    let linear_det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if m.iter().all(|v| v.is_finite()) && linear_det.abs() > 1e-12 {
        Some(m)
    } else {
        None
    }
}

/// Smallest eigenvalue of the point covariance relative to its trace. Zero
/// for collinear points.
fn spread(pts: &[DVec2]) -> f64 {
    let n = pts.len() as f64;
    let c = pts.iter().copied().sum::<DVec2>() / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in pts {
        let d = *p - c;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let trace = sxx + syy;
    if trace <= 0.0 || !trace.is_finite() {
        return 0.0;
    }
    let min_eig = (trace - ((sxx - syy).powi(2) + 4.0 * sxy * sxy).sqrt()) / 2.0;
    min_eig / trace
}
