//! Render components
//!
//! Pure data. The frame stages under `render::systems` hold all the logic.

pub mod camera;
pub mod drawable;
pub mod lighting;
pub mod scene;
pub mod transform;

pub use camera::CameraComponent;
pub use drawable::{DrawableComponent, NameComponent, RenderFlags};
pub use lighting::{LightComponent, LightFactory, LightId, LightType};
pub use scene::{SceneId, SceneMembership};
pub use transform::TransformComponent;
