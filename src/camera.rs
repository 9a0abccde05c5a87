use nalgebra as na;

use crate::types::Homography;

/// Pinhole intrinsics of the capture camera. Not calibrated at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub k: na::Matrix3<f64>,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        CameraIntrinsics {
            k: na::Matrix3::new(1642.0, 0.0, 1176.0, 0.0, 1642.0, 714.0, 0.0, 0.0, 1.0),
        }
    }
}

impl CameraIntrinsics {
    /// Pose of the marker plane (z = 0, in marker pixels) in camera
    /// coordinates, from a marker-to-frame homography.
    pub fn plane_pose(&self, h: &Homography) -> Option<na::Isometry3<f64>> {
        let m = self.k.try_inverse()? * h;
        let (c0, c1, c2) = (m.column(0), m.column(1), m.column(2));
        let norm = (c0.norm() * c1.norm()).sqrt();
        if !norm.is_finite() || norm < 1e-12 {
            return None;
        }
        let mut scale = 1.0 / norm;
        if c2[2] * scale < 0.0 {
            scale = -scale;
        }
        let r1 = c0 * scale;
        let r2 = c1 * scale;
        let r3 = r1.cross(&r2);
        let t = c2 * scale;

        let r = na::Matrix3::from_columns(&[r1, r2, r3]);
        let rotation = na::Rotation3::from_matrix(&r);
        Some(na::Isometry3::from_parts(
            na::Translation3::from(t),
            na::UnitQuaternion::from(rotation),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_pose() {
        let camera = CameraIntrinsics::default();
        let rotation = na::Rotation3::from_euler_angles(0.1, -0.2, 0.05);
        let t = na::Vector3::new(10.0, -5.0, 2000.0);
        let rm = rotation.matrix();
        let h = camera.k
            * na::Matrix3::from_columns(&[rm.column(0).into_owned(), rm.column(1).into_owned(), t])
            * -0.5;

        let pose = camera.plane_pose(&h).unwrap();
        assert!((pose.translation.vector - t).norm() < 1e-6);
        assert!(pose.rotation.angle_to(&na::UnitQuaternion::from(rotation)) < 1e-6);
    }

    #[test]
    fn test_singular_homography() {
        assert!(CameraIntrinsics::default().plane_pose(&Homography::zeros()).is_none());
    }
}
