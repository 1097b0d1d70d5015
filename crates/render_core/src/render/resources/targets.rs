//! Off-screen render targets
//!
//! The forward pass renders into an off-screen color + depth framebuffer.
//! At the end of the frame the color attachment is copied into a separate
//! sampled texture so later passes never read the texture being written.
//! The shadow pass renders depth only into its own framebuffer.

use crate::render::api::{
    FramebufferDescription, FramebufferHandle, GraphicsDevice, ResourceHandle, TextureDescription, TextureFormat,
    TextureHandle, TextureUsage,
};
use crate::render::RenderResult;

/// Render targets owned by the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargets {
    /// Off-screen color attachment
    pub color: TextureHandle,
    /// Off-screen depth attachment
    pub depth: TextureHandle,
    /// Framebuffer over `color` and `depth`
    pub framebuffer: FramebufferHandle,
    /// Sampled copy of the last finished color target
    pub color_copy: TextureHandle,
    /// Shadow map depth texture
    pub shadow_depth: TextureHandle,
    /// Framebuffer over `shadow_depth`
    pub shadow_framebuffer: FramebufferHandle,
}

impl RenderTargets {
    /// Create every target for an extent and shadow map resolution
    pub fn new(device: &mut dyn GraphicsDevice, extent: (u32, u32), shadow_resolution: u32) -> RenderResult<Self> {
        let (width, height) = extent;
        let texture = |format, usage, label: &str, (width, height): (u32, u32)| TextureDescription {
            width,
            height,
            format,
            usage,
            label: label.to_string(),
        };

        let color = device.create_texture(&texture(
            TextureFormat::Rgba16Float,
            TextureUsage::RenderTarget,
            "offscreen_color",
            extent,
        ))?;
        let depth = device.create_texture(&texture(
            TextureFormat::Depth32Float,
            TextureUsage::DepthStencil,
            "offscreen_depth",
            extent,
        ))?;
        let framebuffer = device.create_framebuffer(&FramebufferDescription {
            color: Some(color),
            depth: Some(depth),
            label: "offscreen".to_string(),
        })?;
        let color_copy = device.create_texture(&texture(
            TextureFormat::Rgba16Float,
            TextureUsage::Sampled,
            "offscreen_color_copy",
            extent,
        ))?;

        let shadow_depth = device.create_texture(&texture(
            TextureFormat::Depth32Float,
            TextureUsage::DepthStencil,
            "shadow_map",
            (shadow_resolution, shadow_resolution),
        ))?;
        let shadow_framebuffer = device.create_framebuffer(&FramebufferDescription {
            color: None,
            depth: Some(shadow_depth),
            label: "shadow".to_string(),
        })?;

        log::info!(
            "Created render targets {}x{} (shadow map {}x{})",
            width,
            height,
            shadow_resolution,
            shadow_resolution
        );

        Ok(Self {
            color,
            depth,
            framebuffer,
            color_copy,
            shadow_depth,
            shadow_framebuffer,
        })
    }

    /// Every handle, textures before the framebuffers that reference them
    pub fn resources(&self) -> Vec<ResourceHandle> {
        vec![
            ResourceHandle::Texture(self.color_copy),
            ResourceHandle::Texture(self.color),
            ResourceHandle::Texture(self.depth),
            ResourceHandle::Texture(self.shadow_depth),
            ResourceHandle::Framebuffer(self.framebuffer),
            ResourceHandle::Framebuffer(self.shadow_framebuffer),
        ]
    }
}
