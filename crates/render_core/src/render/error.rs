//! Rendering errors

use crate::config::ConfigError;

/// Errors surfaced by the rendering core
///
/// Unresolvable meshes or materials during a frame are not errors: the
/// affected batch is skipped and logged. The variants below are returned from
/// explicit lookups and from lifecycle violations, which the host should treat
/// as fatal.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// No mesh is registered under the key
    #[error("Mesh not found: {0}")]
    MeshNotFound(String),

    /// No material is registered under the name
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    /// A GPU resource was used after it was disposed
    ///
    /// Lifecycle error: the caller kept a handle past its owner's disposal.
    #[error("Resource used after disposal: {kind} {name}")]
    ResourceDisposed {
        /// Resource kind (buffer, texture, pipeline, ...)
        kind: &'static str,
        /// Name or handle of the resource
        name: String,
    },

    /// A material is not in the state the operation requires
    #[error("Material {name} is {state}, expected {expected}")]
    InvalidMaterialState {
        /// Material name
        name: String,
        /// Current state
        state: &'static str,
        /// State the operation needs
        expected: &'static str,
    },

    /// A shader descriptor is malformed
    #[error("Invalid shader descriptor {name}: {reason}")]
    InvalidShader {
        /// Descriptor name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A material property was set with the wrong shape or an unknown name
    #[error("Invalid property {property} on material {material}: {reason}")]
    InvalidProperty {
        /// Material name
        material: String,
        /// Property name
        property: String,
        /// What is wrong with it
        reason: String,
    },

    /// The graphics device rejected an operation
    #[error("Device error: {0}")]
    Device(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
