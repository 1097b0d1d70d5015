//! Drawable, visibility and naming components

use crate::ecs::Component;

/// Which mesh and material a drawable renders with
///
/// Keys are resolved every frame; an unresolvable key makes the drawable
/// inert rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DrawableComponent {
    /// Mesh registry key
    pub mesh: String,
    /// Material registry name
    pub material: String,
}

impl Component for DrawableComponent {}

impl DrawableComponent {
    /// Create a drawable from its keys
    pub fn new(mesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            material: material.into(),
        }
    }
}

/// Per-entity render flags
///
/// `visible` is owned by the cull stage; `casts_shadow` is read by the
/// shadow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags {
    /// Inside the active camera frustum as of the last cull
    pub visible: bool,
    /// Drawn into the shadow map
    pub casts_shadow: bool,
}

impl Component for RenderFlags {}

impl RenderFlags {
    /// Flags for a freshly spawned drawable (not yet visible)
    pub const fn new(casts_shadow: bool) -> Self {
        Self {
            visible: false,
            casts_shadow,
        }
    }
}

/// Human-readable entity name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameComponent(pub String);

impl Component for NameComponent {}

impl NameComponent {
    /// Create a name component
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}
