//! Device-facing API: handles, command lists and the device trait

pub mod command_list;
pub mod handles;
pub mod render_backend;

pub use command_list::{CommandList, GpuCommand};
pub use handles::{
    sort_for_shutdown, BufferHandle, FramebufferHandle, PipelineHandle, ResourceHandle,
    ResourceLayoutHandle, ResourceSetHandle, SamplerHandle, TextureHandle,
};
pub use render_backend::{
    BufferDescription, BufferUsage, FramebufferDescription, GraphicsDevice, OutputDescription,
    PipelineDescription, ResourceBinding, ResourceLayoutDescription, ResourceLayoutElement,
    ResourceSetDescription, SamplerDescription, SamplerFilter, TextureDescription, TextureFormat,
    TextureUsage,
};
