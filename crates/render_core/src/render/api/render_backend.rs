//! Graphics device abstraction
//!
//! The frame stages talk to the GPU only through [`GraphicsDevice`]: resource
//! creation, ordered command submission, and disposal. A concrete backend
//! (Vulkan, or the CPU-side headless device used in tests) implements it.

use std::any::Any;

use super::command_list::CommandList;
use super::handles::{
    BufferHandle, FramebufferHandle, PipelineHandle, ResourceHandle, ResourceLayoutHandle,
    ResourceSetHandle, SamplerHandle, TextureHandle,
};
use crate::render::resources::materials::{PipelineState, ResourceKind, ShaderStage};
use crate::render::RenderResult;

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-vertex data
    Vertex,
    /// 32-bit indices
    Index,
    /// Uniform block
    Uniform,
    /// Per-instance vertex data
    Instance,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescription {
    /// Size in bytes
    pub size: usize,
    /// Binding usage
    pub usage: BufferUsage,
    /// Debug label
    pub label: String,
}

/// Texel formats used by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized
    Rgba8,
    /// 16-bit float RGBA (off-screen color)
    Rgba16Float,
    /// 32-bit float depth
    Depth32Float,
}

/// How a texture is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    /// Read by shaders only
    Sampled,
    /// Color attachment that can also be sampled
    RenderTarget,
    /// Depth attachment that can also be sampled
    DepthStencil,
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescription {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Usage
    pub usage: TextureUsage,
    /// Debug label
    pub label: String,
}

/// Sampler filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    /// Nearest texel
    Point,
    /// Bilinear
    Linear,
    /// Depth comparison (shadow lookups)
    Comparison,
}

/// Sampler creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDescription {
    /// Filtering mode
    pub filter: SamplerFilter,
}

/// Attachments of a framebuffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDescription {
    /// Color attachment
    pub color: Option<TextureHandle>,
    /// Depth attachment
    pub depth: Option<TextureHandle>,
    /// Debug label
    pub label: String,
}

/// Output layout a pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputDescription {
    /// Color attachment format
    pub color: Option<TextureFormat>,
    /// Depth attachment format
    pub depth: Option<TextureFormat>,
}

/// One slot of a resource layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayoutElement {
    /// Binding name
    pub name: String,
    /// Binding kind
    pub kind: ResourceKind,
}

/// Ordered binding layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayoutDescription {
    /// Bindings in slot order
    pub elements: Vec<ResourceLayoutElement>,
}

/// A resource bound into a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBinding {
    /// Uniform buffer
    Buffer(BufferHandle),
    /// Texture
    Texture(TextureHandle),
    /// Sampler
    Sampler(SamplerHandle),
}

impl ResourceBinding {
    /// Kind this binding satisfies
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::UniformBuffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }
}

/// Resource set creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSetDescription {
    /// Layout the bindings follow
    pub layout: ResourceLayoutHandle,
    /// Bindings in layout order
    pub bindings: Vec<ResourceBinding>,
}

/// Pipeline creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescription {
    /// Debug label
    pub label: String,
    /// Fixed-function state
    pub state: PipelineState,
    /// Shader stages
    pub stages: Vec<ShaderStage>,
    /// Resource layouts by set slot
    pub layouts: Vec<ResourceLayoutHandle>,
    /// Output attachment formats
    pub outputs: OutputDescription,
    /// Whether vertex slot 1 carries per-instance world matrices
    pub instanced: bool,
}

/// Graphics device trait
///
/// Command lists are executed in submission order. Uniform buffer writes
/// recorded inside a list take effect at their position in the list, so a
/// single-slot buffer can be rewritten between draws.
pub trait GraphicsDevice {
    /// Create a buffer
    fn create_buffer(&mut self, description: &BufferDescription) -> RenderResult<BufferHandle>;

    /// Write bytes into a buffer immediately
    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> RenderResult<()>;

    /// Create a texture
    fn create_texture(&mut self, description: &TextureDescription) -> RenderResult<TextureHandle>;

    /// Create a sampler
    fn create_sampler(&mut self, description: &SamplerDescription) -> RenderResult<SamplerHandle>;

    /// Create a framebuffer from existing attachments
    fn create_framebuffer(&mut self, description: &FramebufferDescription) -> RenderResult<FramebufferHandle>;

    /// Attachment formats of a framebuffer
    fn framebuffer_outputs(&self, framebuffer: FramebufferHandle) -> RenderResult<OutputDescription>;

    /// Create a resource layout
    fn create_resource_layout(&mut self, description: &ResourceLayoutDescription) -> RenderResult<ResourceLayoutHandle>;

    /// Create a resource set
    fn create_resource_set(&mut self, description: &ResourceSetDescription) -> RenderResult<ResourceSetHandle>;

    /// Create a pipeline
    fn create_pipeline(&mut self, description: &PipelineDescription) -> RenderResult<PipelineHandle>;

    /// Execute a recorded command list
    fn submit_commands(&mut self, commands: &CommandList) -> RenderResult<()>;

    /// Block until every submitted list has finished
    fn wait_for_idle(&mut self) -> RenderResult<()>;

    /// Present the finished frame
    fn present(&mut self) -> RenderResult<()>;

    /// Release a resource; the handle is dead afterwards
    fn dispose(&mut self, resource: ResourceHandle) -> RenderResult<()>;

    /// Tear the device down; every later call fails
    fn shutdown(&mut self) -> RenderResult<()>;

    /// Backend downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable backend downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
