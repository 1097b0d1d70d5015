//! Rendering: device API, backends, GPU resources and the per-frame systems

pub mod api;
pub mod backends;
pub mod error;
pub mod resources;
pub mod systems;

pub use error::{RenderError, RenderResult};
