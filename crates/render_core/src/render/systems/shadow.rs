//! Sun shadows
//!
//! [`ShadowFrustumFitter`] fits an orthographic light-space projection
//! around the camera's view volume every frame. The light-space origin is
//! snapped to whole shadow-map texels so the shadow map does not shimmer
//! while the camera moves. [`ShadowPass`] then renders the depth of every
//! shadow-casting drawable into the shadow map with that matrix.

use super::camera_view::CameraView;
use crate::config::ShadowConfig;
use crate::ecs::components::{DrawableComponent, RenderFlags};
use crate::ecs::World;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::api::{CommandList, GraphicsDevice};
use crate::render::resources::materials::{MaterialRegistry, ShaderDescriptor};
use crate::render::resources::uniforms::TransformBlock;
use crate::render::resources::{MeshRegistry, RenderTargets};
use crate::render::RenderResult;
use crate::spatial::LightRecord;

/// Fits the sun's view-projection to the camera frustum
#[derive(Debug, Clone)]
pub struct ShadowFrustumFitter {
    resolution: f32,
    far_distance: f32,
    fov_y: f32,
    light_view: Mat4,
    light_projection: Mat4,
    light_view_projection: Mat4,
}

impl ShadowFrustumFitter {
    /// Create a fitter; the matrix is identity until the first fit with a sun
    pub fn new(config: &ShadowConfig) -> Self {
        Self {
            resolution: config.resolution as f32,
            far_distance: config.far_distance,
            fov_y: utils::deg_to_rad(config.fov_degrees),
            light_view: Mat4::identity(),
            light_projection: Mat4::identity(),
            light_view_projection: Mat4::identity(),
        }
    }

    /// Current light view matrix
    pub fn light_view(&self) -> &Mat4 {
        &self.light_view
    }

    /// Current light projection matrix
    pub fn light_projection(&self) -> &Mat4 {
        &self.light_projection
    }

    /// Current light view-projection matrix
    pub fn light_view_projection(&self) -> &Mat4 {
        &self.light_view_projection
    }

    /// World-space corners of a view volume: near plane then far plane,
    /// each as top-left, top-right, bottom-right, bottom-left
    pub fn frustum_corners(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> [Vec3; 8] {
        let forward = forward.normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward);
        let tan_half = (fov_y * 0.5).tan();

        let plane = |distance: f32| {
            let half_width = distance * tan_half;
            let half_height = half_width / aspect;
            let center = position + forward * distance;
            [
                center + up * half_height - right * half_width,
                center + up * half_height + right * half_width,
                center - up * half_height + right * half_width,
                center - up * half_height - right * half_width,
            ]
        };
        let [ntl, ntr, nbr, nbl] = plane(near);
        let [ftl, ftr, fbr, fbl] = plane(far);
        [ntl, ntr, nbr, nbl, ftl, ftr, fbr, fbl]
    }

    /// Refit against the camera; without a sun the previous matrix is kept
    pub fn fit(&mut self, camera: &CameraView, sun: Option<&LightRecord>) -> &Mat4 {
        let Some(sun) = sun else {
            return &self.light_view_projection;
        };
        if sun.direction.norm_squared() < 1e-12 {
            log::trace!("Sun has no direction; keeping the previous shadow matrix");
            return &self.light_view_projection;
        }
        let direction = sun.direction.normalize();

        let corners = Self::frustum_corners(
            camera.position,
            camera.forward,
            camera.up,
            self.fov_y,
            camera.aspect,
            camera.near,
            self.far_distance,
        );
        let center = corners.iter().sum::<Vec3>() / corners.len() as f32;
        // Each near corner is paired with the far corner diagonally opposite
        let radius = (0..4)
            .map(|i| (corners[i] - corners[(i + 2) % 4 + 4]).norm())
            .fold(0.0_f32, f32::max)
            * 0.5;
        if !radius.is_finite() || radius <= 0.0 {
            log::trace!("Degenerate camera volume; keeping the previous shadow matrix");
            return &self.light_view_projection;
        }

        let up = if direction.dot(&Vec3::y()).abs() > 0.99 {
            Vec3::z()
        } else {
            Vec3::y()
        };

        let texels_per_unit = self.resolution / (2.0 * radius);
        let texel_space = Mat4::new_scaling(texels_per_unit) * Mat4::look_at(Vec3::zeros(), -direction, up);
        let Some(texel_space_inverse) = texel_space.try_inverse() else {
            return &self.light_view_projection;
        };
        let mut snapped = texel_space * Vec4::new(center.x, center.y, center.z, 1.0);
        snapped.x = snapped.x.floor();
        snapped.y = snapped.y.floor();
        let snapped_center = (texel_space_inverse * snapped).xyz();

        let eye = snapped_center - direction * (2.0 * radius);
        self.light_view = Mat4::look_at(eye, snapped_center, up);
        self.light_projection = Mat4::orthographic(-radius, radius, -radius, radius, -4.0 * radius, 4.0 * radius)
            * Mat4::vulkan_coordinate_transform();
        self.light_view_projection = self.light_projection * self.light_view;
        &self.light_view_projection
    }
}

/// Depth-only pass rendering shadow casters into the shadow map
#[derive(Debug)]
pub struct ShadowPass {
    commands: CommandList,
    block: TransformBlock,
    scratch: Vec<f32>,
    max_depth: usize,
    warned_missing_material: bool,
}

impl ShadowPass {
    /// Create the pass
    pub fn new(max_depth: usize) -> Self {
        Self {
            commands: CommandList::new("shadow_pass"),
            block: TransformBlock::default(),
            scratch: Vec::new(),
            max_depth,
            warned_missing_material: false,
        }
    }

    /// Record, submit and wait for the shadow pass; returns the draw count
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &World,
        meshes: &MeshRegistry,
        materials: &MaterialRegistry,
        targets: &RenderTargets,
        light_view_projection: &Mat4,
    ) -> RenderResult<usize> {
        let Some(gpu) = materials
            .get_by_name(ShaderDescriptor::SHADOW_DEPTH)
            .and_then(|material| material.gpu().copied())
        else {
            if !self.warned_missing_material {
                log::warn!("Shadow material '{}' is missing; shadow pass skipped", ShaderDescriptor::SHADOW_DEPTH);
                self.warned_missing_material = true;
            }
            return Ok(0);
        };
        let shared = *materials.shared();

        self.block = TransformBlock {
            light_view_projection: *light_view_projection,
            ..TransformBlock::default()
        };

        self.commands.begin();
        self.commands.set_framebuffer(targets.shadow_framebuffer);
        self.commands.clear_depth(1.0);
        self.commands.set_pipeline(gpu.pipeline);
        self.commands.set_resource_set(0, shared.set);
        self.commands.set_resource_set(1, gpu.resource_set);

        let mut draws = 0;
        for (entity, drawable) in world.query::<DrawableComponent>() {
            let casts = world.get::<RenderFlags>(entity).is_some_and(|flags| flags.casts_shadow);
            if !casts || !world.is_active(entity) {
                continue;
            }
            let Some(mesh) = meshes.get(&drawable.mesh) else {
                continue;
            };
            let Some(matrix) = world.world_matrix(entity, self.max_depth) else {
                continue;
            };

            self.block.world = matrix;
            self.block.write_floats(&mut self.scratch);
            self.commands.set_vertex_buffer(0, mesh.vertex_buffer);
            self.commands.set_index_buffer(mesh.index_buffer);
            self.commands.update_buffer(shared.transform, 0, &self.scratch);
            self.commands.draw_indexed(mesh.index_count, 1);
            draws += 1;
        }
        self.commands.end();

        device.submit_commands(&self.commands)?;
        device.wait_for_idle()?;
        log::debug!("Shadow pass drew {} casters", draws);
        Ok(draws)
    }
}
