//! # render_core
//!
//! The per-frame control core of a forward renderer. Every tick it decides
//! which drawables are on screen, which lights touch which surfaces, where the
//! sun's shadow map has to look, and how draws are grouped and handed to the
//! graphics device.
//!
//! ## Architecture
//!
//! - **Foundation**: math types, logging setup, frame clock
//! - **ECS**: parallel-array entity store with the render components
//! - **Spatial**: bounds, frustum planes, arena octree and the light index
//! - **Render**: device abstraction, materials, meshes and the frame stages
//!   (cull, light refresh, shadow, forward, present)
//! - **Renderer**: the host-facing facade that owns all of the above
//!
//! ```no_run
//! use render_core::prelude::*;
//!
//! # fn main() -> Result<(), RenderError> {
//! let device = Box::new(HeadlessDevice::new());
//! let mut core = RenderCore::new(device, RenderConfig::default())?;
//! core.create_camera("main", Vec3::new(0.0, 2.0, 8.0), Vec3::zeros(), 60.0, 16.0 / 9.0, 0.1, 100.0);
//! let stats = core.tick(1.0 / 60.0)?;
//! println!("drew {} batches", stats.draw.batches);
//! core.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ecs;
pub mod foundation;
pub mod render;
pub mod renderer;
pub mod spatial;

pub use renderer::RenderCore;

/// Commonly used types for hosts driving the renderer
pub mod prelude {
    pub use crate::config::{Config, ConfigError, RenderConfig, ShadowConfig, LightIndexConfig};
    pub use crate::ecs::components::{
        CameraComponent, DrawableComponent, LightComponent, LightFactory, LightId, LightType,
        NameComponent, RenderFlags, SceneId, TransformComponent,
    };
    pub use crate::ecs::{Entity, World};
    pub use crate::foundation::math::{Mat4, Mat4Ext, Quat, Transform, Vec3};
    pub use crate::render::api::GraphicsDevice;
    pub use crate::render::backends::HeadlessDevice;
    pub use crate::render::resources::materials::{
        MaterialId, PropertyShape, PropertyValue, ResourceKind, ShaderDescriptor,
    };
    pub use crate::render::resources::mesh::{MeshData, ModelDescription, ModelNode, Vertex};
    pub use crate::render::systems::frame::{FrameStage, FrameStats};
    pub use crate::render::{RenderError, RenderResult};
    pub use crate::renderer::RenderCore;
}
