use glam::DVec2;
use nalgebra as na;

use crate::config::TransformConfig;
use crate::error::{Error, Result};
use crate::optimization::fit_affine;
use crate::types::project_point;

/// Geographic `[lat, lon]` to marker pixels through an affine transform
/// extended to 3x3.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateProjector {
    matrix: na::Matrix3<f64>,
    inverse: na::Matrix3<f64>,
}

impl CoordinateProjector {
    /// `src` holds geographic points in planar `[lon, lat]` order, `dst` the
    /// marker pixels they land on. Three pairs give the exact affine, more
    /// give the least-squares one.
    pub fn from_correspondences(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<CoordinateProjector> {
        if src.len() != dst.len() {
            return Err(Error::MismatchedCorrespondences {
                src: src.len(),
                dst: dst.len(),
            });
        }
        if src.len() < 3 {
            return Err(Error::TooFewCorrespondences {
                needed: 3,
                got: src.len(),
            });
        }
        let src: Vec<DVec2> = src.iter().map(|&[x, y]| DVec2::new(x, y)).collect();
        let dst: Vec<DVec2> = dst.iter().map(|&[x, y]| DVec2::new(x, y)).collect();
        let matrix = fit_affine(&src, &dst).ok_or(Error::DegenerateTransform)?;
        let inverse = matrix.try_inverse().ok_or(Error::DegenerateTransform)?;
        Ok(CoordinateProjector { matrix, inverse })
    }

    pub fn from_config(config: &TransformConfig) -> Result<CoordinateProjector> {
        CoordinateProjector::from_correspondences(&config.src, &config.dst)
    }

    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.matrix
    }

    /// Marker pixel of a `[lat, lon]` coordinate.
    pub fn to_pixels(&self, coord: [f64; 2]) -> Option<DVec2> {
        project_point(&self.matrix, lon_lat(coord))
    }

    /// `[lat, lon]` of a marker pixel.
    pub fn to_geographic(&self, pixel: DVec2) -> Option<[f64; 2]> {
        project_point(&self.inverse, pixel).map(|p| [p.y, p.x])
    }
}

fn lon_lat([lat, lon]: [f64; 2]) -> DVec2 {
    DVec2::new(lon, lat)
}
