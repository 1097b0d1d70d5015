//! Generational GPU resource handles
//!
//! Handles are `slotmap` keys: once a resource is disposed its handle never
//! resolves again, even if the slot is reused.

use slotmap::new_key_type;

new_key_type! {
    /// Vertex, index, uniform or instance buffer
    pub struct BufferHandle;
    /// Sampled, render-target or depth texture
    pub struct TextureHandle;
    /// Texture sampler
    pub struct SamplerHandle;
    /// Set of color/depth attachments
    pub struct FramebufferHandle;
    /// Ordered binding layout
    pub struct ResourceLayoutHandle;
    /// Resources bound against a layout
    pub struct ResourceSetHandle;
    /// Compiled pipeline state
    pub struct PipelineHandle;
}

/// Any disposable device resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    /// Buffer
    Buffer(BufferHandle),
    /// Texture
    Texture(TextureHandle),
    /// Sampler
    Sampler(SamplerHandle),
    /// Framebuffer
    Framebuffer(FramebufferHandle),
    /// Resource layout
    ResourceLayout(ResourceLayoutHandle),
    /// Resource set
    ResourceSet(ResourceSetHandle),
    /// Pipeline
    Pipeline(PipelineHandle),
}

impl ResourceHandle {
    /// Position in the shutdown sequence:
    /// textures, framebuffers, pipelines (with their sets and layouts), buffers
    pub const fn shutdown_rank(&self) -> u8 {
        match self {
            Self::Texture(_) | Self::Sampler(_) => 0,
            Self::Framebuffer(_) => 1,
            Self::ResourceSet(_) | Self::Pipeline(_) | Self::ResourceLayout(_) => 2,
            Self::Buffer(_) => 3,
        }
    }

    /// Human-readable kind
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Texture(_) => "texture",
            Self::Sampler(_) => "sampler",
            Self::Framebuffer(_) => "framebuffer",
            Self::ResourceLayout(_) => "resource layout",
            Self::ResourceSet(_) => "resource set",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// Sort resources into shutdown order, keeping the given order within a rank
pub fn sort_for_shutdown(resources: &mut [ResourceHandle]) {
    resources.sort_by_key(ResourceHandle::shutdown_rank);
}
