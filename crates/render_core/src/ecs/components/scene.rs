//! Scene membership
//!
//! One entity store can hold several scenes; disabling a scene hides all of
//! its entities from the frame stages without releasing anything.

use crate::ecs::Component;

/// Scene identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SceneId(pub u32);

/// Tags an entity as belonging to a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneMembership {
    /// The owning scene
    pub scene: SceneId,
}

impl Component for SceneMembership {}
