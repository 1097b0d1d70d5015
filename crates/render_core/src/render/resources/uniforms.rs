//! Uniform block layouts
//!
//! Blocks are written as flat `f32` arrays (matrices column-major) and
//! uploaded with `bytemuck`. Each block has one shared, single-slot buffer,
//! so every write must be consumed by its draw before the next write.

use crate::foundation::math::Mat4;
use crate::spatial::{LightRecord, LIGHT_RECORD_FLOATS};

/// Floats reserved for a material's packed properties
pub const MATERIAL_BLOCK_FLOATS: usize = 64;

/// Floats in a [`TransformBlock`]
pub const TRANSFORM_BLOCK_FLOATS: usize = 6 * 16;

/// Floats per instance in the instance buffer
pub const INSTANCE_FLOATS: usize = 16;

/// Per-draw transform uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformBlock {
    /// Object to world
    pub world: Mat4,
    /// Inverse-transpose of `world`
    pub normal: Mat4,
    /// World to view
    pub view: Mat4,
    /// View to clip (`P * X`)
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Sun shadow map view-projection
    pub light_view_projection: Mat4,
}

impl Default for TransformBlock {
    fn default() -> Self {
        Self {
            world: Mat4::identity(),
            normal: Mat4::identity(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            view_projection: Mat4::identity(),
            light_view_projection: Mat4::identity(),
        }
    }
}

impl TransformBlock {
    /// Flatten into `out` (cleared first)
    pub fn write_floats(&self, out: &mut Vec<f32>) {
        out.clear();
        for matrix in [
            &self.world,
            &self.normal,
            &self.view,
            &self.projection,
            &self.view_projection,
            &self.light_view_projection,
        ] {
            out.extend_from_slice(matrix.as_slice());
        }
    }

    /// Byte size of the block
    pub const fn byte_size() -> usize {
        TRANSFORM_BLOCK_FLOATS * std::mem::size_of::<f32>()
    }
}

/// Light uniforms: a fixed number of light records
pub struct LightBlock;

impl LightBlock {
    /// Flatten records into `out` (cleared first)
    pub fn write_floats(records: &[LightRecord], out: &mut Vec<f32>) {
        out.clear();
        for record in records {
            record.write_floats(out);
        }
    }

    /// Byte size of a block holding `max_lights` records
    pub const fn byte_size(max_lights: usize) -> usize {
        max_lights * LIGHT_RECORD_FLOATS * std::mem::size_of::<f32>()
    }
}

/// Byte size of the material block
pub const fn material_block_byte_size() -> usize {
    MATERIAL_BLOCK_FLOATS * std::mem::size_of::<f32>()
}
