use glam::DVec2;
use log::trace;
use nalgebra as na;
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Homography, is_valid_homography, normalize_homography, project_point};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Maximum reprojection error of an inlier, in destination pixels.
    pub reprojection_threshold: f64,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            reprojection_threshold: 5.0,
            confidence: 0.995,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub h: Homography,
    /// One flag per input pair.
    pub inliers: Vec<bool>,
}

impl HomographyEstimate {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

const NULL_SPACE_GAP: f64 = 1e-10;

/// Hartley normalization: centroid to the origin, mean distance sqrt(2).
fn normalization(pts: &[DVec2]) -> Option<na::Matrix3<f64>> {
    let n = pts.len() as f64;
    let c = pts.iter().copied().sum::<DVec2>() / n;
    let mean_dist = pts.iter().map(|p| p.distance(c)).sum::<f64>() / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(na::Matrix3::new(
        s,
        0.0,
        -s * c.x,
        0.0,
        s,
        -s * c.y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Direct linear transform on at least 4 pairs, solved as the eigenvector of
/// the smallest eigenvalue of `AᵀA`. Returns `None` when the pairs do not
/// pin down a unique homography.
pub fn homography_dlt(src: &[DVec2], dst: &[DVec2]) -> Option<Homography> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }
    if let (Ok(s), Ok(d)) = (<&[DVec2; 4]>::try_from(src), <&[DVec2; 4]>::try_from(dst)) {
        if degenerate_sample(s) || degenerate_sample(d) {
            return None;
        }
    }
    let t_src = normalization(src)?;
    let t_dst = normalization(dst)?;

    let mut ata = na::SMatrix::<f64, 9, 9>::zeros();
    for (p, q) in src.iter().zip(dst) {
        let p = t_src * na::Vector3::new(p.x, p.y, 1.0);
        let q = t_dst * na::Vector3::new(q.x, q.y, 1.0);
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = na::SVector::<f64, 9>::from_column_slice(&[
            -x,
            -y,
            -1.0,
            0.0,
            0.0,
            0.0,
            u * x,
            u * y,
            u,
        ]);
        let r1 = na::SVector::<f64, 9>::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            -x,
            -y,
            -1.0,
            v * x,
            v * y,
            v,
        ]);
        ata += r0 * r0.transpose() + r1 * r1.transpose();
    }

    let eigen = ata.symmetric_eigen();
    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    // a second near-zero eigenvalue means the null space is not one-dimensional
    let largest = eigen.eigenvalues[order[8]];
    if !(eigen.eigenvalues[order[1]] > NULL_SPACE_GAP * largest) {
        return None;
    }
    let h = eigen.eigenvectors.column(order[0]);
    let hn = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let h = t_dst.try_inverse()? * hn * t_src;
    let h = normalize_homography(&h);
    is_valid_homography(&h).then_some(h)
}

fn collinear(a: DVec2, b: DVec2, c: DVec2) -> bool {
    let ab = b - a;
    let ac = c - a;
    ab.perp_dot(ac).abs() <= 1e-6 * ab.length() * ac.length()
}

fn degenerate_sample(pts: &[DVec2; 4]) -> bool {
    [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)]
        .iter()
        .any(|&(i, j, k)| collinear(pts[i], pts[j], pts[k]))
}

fn mark_inliers(h: &Homography, src: &[DVec2], dst: &[DVec2], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(p, q)| project_point(h, *p).is_some_and(|r| r.distance(*q) <= threshold))
        .collect()
}

fn required_iterations(inlier_ratio: f64, confidence: f64, max_iterations: usize) -> usize {
    let all_good = inlier_ratio.powi(4);
    if all_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if all_good <= f64::EPSILON {
        return max_iterations;
    }
    let n = (1.0 - confidence).ln() / (1.0 - all_good).ln();
    if n.is_finite() {
        (n.ceil().max(1.0) as usize).min(max_iterations)
    } else {
        max_iterations
    }
}

/// Outlier tolerant homography from pairs `src[i] -> dst[i]`.
#[derive(Debug, Clone, Default)]
pub struct RansacHomography {
    config: RansacConfig,
}

impl RansacHomography {
    pub fn new(config: RansacConfig) -> RansacHomography {
        RansacHomography { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// `None` when there are fewer than 4 pairs, when no sample yields 4
    /// inliers, or when the best model is singular.
    pub fn estimate(&self, src: &[DVec2], dst: &[DVec2]) -> Option<HomographyEstimate> {
        let n = src.len();
        if n < 4 || n != dst.len() {
            return None;
        }
        let threshold = self.config.reprojection_threshold;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut best: Option<(Homography, Vec<bool>, usize)> = None;
        let mut needed = self.config.max_iterations;
        let mut iteration = 0;
        while iteration < needed {
            iteration += 1;
            let sample = index::sample(&mut rng, n, 4);
            let s: [usize; 4] = [
                sample.index(0),
                sample.index(1),
                sample.index(2),
                sample.index(3),
            ];
            let ps = s.map(|i| src[i]);
            let qs = s.map(|i| dst[i]);
            if degenerate_sample(&ps) || degenerate_sample(&qs) {
                continue;
            }
            let Some(h) = homography_dlt(&ps, &qs) else {
                continue;
            };
            let inliers = mark_inliers(&h, src, dst, threshold);
            let count = inliers.iter().filter(|&&b| b).count();
            if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
                needed = required_iterations(
                    count as f64 / n as f64,
                    self.config.confidence,
                    self.config.max_iterations,
                );
                best = Some((h, inliers, count));
            }
        }

        let (h, inliers, count) = best?;
        if count < 4 {
            return None;
        }
        trace!("ransac: {} of {} inliers after {} iterations", count, n, iteration);

        let (in_src, in_dst): (Vec<DVec2>, Vec<DVec2>) = src
            .iter()
            .zip(dst)
            .zip(&inliers)
            .filter(|(_, keep)| **keep)
            .map(|((p, q), _)| (*p, *q))
            .unzip();
        if let Some(refit) = homography_dlt(&in_src, &in_dst) {
            let refit_inliers = mark_inliers(&refit, src, dst, threshold);
            if refit_inliers.iter().filter(|&&b| b).count() >= count {
                return Some(HomographyEstimate {
                    h: refit,
                    inliers: refit_inliers,
                });
            }
        }
        Some(HomographyEstimate { h, inliers })
    }
}
