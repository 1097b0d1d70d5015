//! Active camera resolution
//!
//! The active camera is picked by its stable identifier; when several active
//! cameras share the identifier the one with the lowest entity index wins.

use crate::ecs::components::CameraComponent;
use crate::ecs::{Entity, World};
use crate::foundation::math::{utils, Mat4, Vec3, Vec4};

/// Camera matrices for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Camera entity
    pub entity: Entity,
    /// World-space eye position
    pub position: Vec3,
    /// World-space viewing direction
    pub forward: Vec3,
    /// World-space up vector
    pub up: Vec3,
    /// World to view
    pub view: Mat4,
    /// View to clip (`P * X`)
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl CameraView {
    /// Resolve the active camera named `id`
    ///
    /// Returns `None` when no active camera carries the identifier or its
    /// world matrix cannot be inverted.
    pub fn resolve(world: &World, id: &str, max_depth: usize) -> Option<Self> {
        let (entity, camera) = world
            .query::<CameraComponent>()
            .filter(|(entity, camera)| camera.id == id && world.is_active(*entity))
            .min_by_key(|(entity, _)| entity.index())?;

        let camera_world = world.world_matrix(entity, max_depth)?;
        let view = camera_world.try_inverse()?;
        let projection = *camera.projection();

        let forward = (camera_world * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz().normalize();
        let up = (camera_world * Vec4::new(0.0, 1.0, 0.0, 0.0)).xyz().normalize();

        Some(Self {
            entity,
            position: utils::translation_of(&camera_world),
            forward,
            up,
            view,
            projection,
            view_projection: projection * view,
            fov_y: camera.fov_y,
            aspect: camera.aspect,
            near: camera.near,
            far: camera.far,
        })
    }
}
