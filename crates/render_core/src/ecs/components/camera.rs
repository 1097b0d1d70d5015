//! Camera component
//!
//! The camera's placement comes from its [`TransformComponent`](super::TransformComponent);
//! this component only carries the lens and the projection derived from it.

use crate::ecs::Component;
use crate::foundation::math::{utils, Mat4, Mat4Ext};

/// Perspective camera lens
#[derive(Debug, Clone, PartialEq)]
pub struct CameraComponent {
    /// Stable identifier used to pick the active camera
    pub id: String,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    projection: Mat4,
}

impl Component for CameraComponent {}

impl CameraComponent {
    /// Create a camera; the field of view is given in degrees
    pub fn new(id: impl Into<String>, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let fov_y = utils::deg_to_rad(fov_degrees);
        Self {
            id: id.into(),
            fov_y,
            aspect,
            near,
            far,
            projection: Self::build_projection(fov_y, aspect, near, far),
        }
    }

    fn build_projection(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective(fov_y, aspect, near, far) * Mat4::vulkan_coordinate_transform()
    }

    /// Precomputed `P * X` projection
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Change the aspect ratio (e.g. after a resize) and rebuild the projection
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection = Self::build_projection(self.fov_y, aspect, self.near, self.far);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_set_aspect_rebuilds_projection() {
        let mut camera = CameraComponent::new("main", 90.0, 1.0, 0.1, 100.0);
        assert_relative_eq!(camera.projection()[(0, 0)], 1.0, epsilon = 1e-5);

        camera.set_aspect(2.0);
        assert_relative_eq!(camera.projection()[(0, 0)], 0.5, epsilon = 1e-5);
        assert_relative_eq!(camera.projection()[(1, 1)], -1.0, epsilon = 1e-5);
    }
}
