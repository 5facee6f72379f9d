//! Camera pose used to order avatars for drawing.
//!
//! The splat renderer owns projection; the core only needs to know where each
//! avatar sits along the camera's viewing axis.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// What a camera renders for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraKind {
    #[default]
    Scene,
    /// Thumbnail/inspector previews; splats are not drawn for these.
    Preview,
}

/// A camera pose (world → camera transform).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera {
    /// Rotation from world to camera coordinates
    pub rotation: Matrix3<f32>,

    /// Translation from world to camera coordinates
    pub translation: Vector3<f32>,

    pub kind: CameraKind,
}

impl Camera {
    pub fn new(rotation: Matrix3<f32>, translation: Vector3<f32>) -> Self {
        Self {
            rotation,
            translation,
            kind: CameraKind::Scene,
        }
    }

    pub fn preview(rotation: Matrix3<f32>, translation: Vector3<f32>) -> Self {
        Self {
            kind: CameraKind::Preview,
            ..Self::new(rotation, translation)
        }
    }

    /// Transform a point from world coordinates to camera coordinates.
    ///
    /// p_camera = R * p_world + t
    pub fn world_to_camera(&self, point_world: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point_world + self.translation
    }

    /// Distance along the viewing axis (+z looks forward).
    pub fn depth_of(&self, point_world: &Vector3<f32>) -> f32 {
        self.world_to_camera(point_world).z
    }

    /// Get the camera center in world coordinates.
    pub fn camera_center(&self) -> Vector3<f32> {
        // C = -R^T * t
        -self.rotation.transpose() * self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_depth_with_translation() {
        let cam = Camera::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(cam.depth_of(&Vector3::new(1.0, 2.0, -1.0)), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_camera_center_maps_to_origin() {
        let r = nalgebra::Rotation3::from_euler_angles(0.3, -0.2, 1.0).into_inner();
        let cam = Camera::new(r, Vector3::new(1.0, -2.0, 0.5));
        let c = cam.camera_center();
        assert_relative_eq!(cam.world_to_camera(&c), Vector3::zeros(), epsilon = 1e-5);
    }
}
