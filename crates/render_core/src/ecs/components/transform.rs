//! Transform component for the ECS system
//!
//! Local position, rotation and scale plus an optional weak parent link.
//! The parent is a plain [`Entity`] handle: it does not keep the parent
//! alive, and a despawned parent simply ends the chain.

use crate::ecs::{Component, Entity};
use crate::foundation::math::{Mat4, Quat, Transform as MathTransform, Vec3};

/// ECS Transform component
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// Position relative to the parent (or world)
    pub position: Vec3,

    /// Rotation relative to the parent (or world)
    pub rotation: Quat,

    /// Scale relative to the parent (or world)
    pub scale: Vec3,

    /// Weak link to the parent transform
    pub parent: Option<Entity>,
}

impl Component for TransformComponent {}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            parent: None,
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from a foundation math transform
    pub fn from_math_transform(transform: &MathTransform) -> Self {
        Self {
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            parent: None,
        }
    }

    /// Convert to foundation math Transform for calculations
    pub fn to_math_transform(&self) -> MathTransform {
        MathTransform {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    /// Local matrix (TRS order), without the parent chain
    pub fn to_matrix(&self) -> Mat4 {
        self.to_math_transform().to_matrix()
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: Set rotation from quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Point the forward axis along a direction
    pub fn with_forward(mut self, direction: Vec3) -> Self {
        self.rotation = MathTransform::looking_along(direction, Vec3::y());
        self
    }

    /// Builder pattern: Set scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: Set uniform scale
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder pattern: Attach to a parent
    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Local forward direction (`-Z`)
    pub fn forward(&self) -> Vec3 {
        self.to_math_transform().forward()
    }

    /// Local right direction (`+X`)
    pub fn right(&self) -> Vec3 {
        self.to_math_transform().right()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity_axes() {
        let transform = TransformComponent::identity();
        assert_relative_eq!(transform.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
        assert_relative_eq!(transform.right(), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(transform.rotation, Quat::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_with_forward_points_forward_axis() {
        let direction = Vec3::new(0.3, -1.0, 0.2).normalize();
        let transform = TransformComponent::identity().with_forward(direction);
        assert_relative_eq!(transform.forward(), direction, epsilon = EPSILON);
    }

    #[test]
    fn test_with_forward_straight_down() {
        let transform = TransformComponent::identity().with_forward(Vec3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(transform.forward(), Vec3::new(0.0, -1.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_matrix_is_trs() {
        let transform = TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0)).with_uniform_scale(2.0);
        let point = transform.to_matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(point.coords, Vec3::new(3.0, 2.0, 3.0), epsilon = EPSILON);
    }
}
