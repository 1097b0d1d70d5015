//! Per-frame systems
//!
//! Each system owns its reusable state (command lists, scratch buffers,
//! caches) and borrows the world and resources for the duration of a stage.

pub mod camera_view;
pub mod culling;
pub mod draw;
pub mod frame;
pub mod light_refresh;
pub mod shadow;

pub use camera_view::CameraView;
pub use culling::{CullStats, FrustumCuller};
pub use draw::{BatchKey, BatchState, DrawOrchestrator, DrawStats, ForwardInputs};
pub use frame::{FrameContext, FrameScheduler, FrameStage, FrameStats};
pub use light_refresh::LightRefresh;
pub use shadow::{ShadowFrustumFitter, ShadowPass};
