//! Recorded GPU command lists
//!
//! Lists are reusable: `begin` clears the previous recording but keeps the
//! allocation, so a cached per-batch list costs nothing to re-record.

use super::handles::{BufferHandle, FramebufferHandle, PipelineHandle, ResourceSetHandle, TextureHandle};

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Bind the render target
    SetFramebuffer(FramebufferHandle),
    /// Clear the bound color attachment
    ClearColor([f32; 4]),
    /// Clear the bound depth attachment
    ClearDepth(f32),
    /// Bind a pipeline
    SetPipeline(PipelineHandle),
    /// Bind a vertex buffer to a slot (0 = vertices, 1 = instances)
    SetVertexBuffer {
        /// Vertex input slot
        slot: u32,
        /// Buffer to bind
        buffer: BufferHandle,
    },
    /// Bind the index buffer
    SetIndexBuffer(BufferHandle),
    /// Bind a resource set to a set slot
    SetResourceSet {
        /// Set slot
        slot: u32,
        /// Set to bind
        set: ResourceSetHandle,
    },
    /// Write bytes into a buffer at this point of the list
    UpdateBuffer {
        /// Target buffer
        buffer: BufferHandle,
        /// Byte offset
        offset: usize,
        /// Bytes to write
        data: Vec<u8>,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices per instance
        index_count: u32,
        /// Instances to draw
        instance_count: u32,
    },
    /// Copy one texture into another of the same size
    CopyTexture {
        /// Source texture
        source: TextureHandle,
        /// Destination texture
        destination: TextureHandle,
    },
}

/// Ordered list of GPU commands
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    label: String,
    commands: Vec<GpuCommand>,
    recording: bool,
}

impl CommandList {
    /// Create an empty list
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
            recording: false,
        }
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start a new recording, discarding the previous one
    pub fn begin(&mut self) {
        self.commands.clear();
        self.recording = true;
    }

    /// Finish recording
    pub fn end(&mut self) {
        self.recording = false;
    }

    /// Whether `begin` was called without a matching `end`
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Recorded commands
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn push(&mut self, command: GpuCommand) {
        if !self.recording {
            log::warn!("Command recorded into '{}' outside begin/end", self.label);
        }
        self.commands.push(command);
    }

    /// Bind the render target
    pub fn set_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.push(GpuCommand::SetFramebuffer(framebuffer));
    }

    /// Clear color
    pub fn clear_color(&mut self, color: [f32; 4]) {
        self.push(GpuCommand::ClearColor(color));
    }

    /// Clear depth
    pub fn clear_depth(&mut self, depth: f32) {
        self.push(GpuCommand::ClearDepth(depth));
    }

    /// Bind a pipeline
    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.push(GpuCommand::SetPipeline(pipeline));
    }

    /// Bind a vertex buffer
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.push(GpuCommand::SetVertexBuffer { slot, buffer });
    }

    /// Bind the index buffer
    pub fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.push(GpuCommand::SetIndexBuffer(buffer));
    }

    /// Bind a resource set
    pub fn set_resource_set(&mut self, slot: u32, set: ResourceSetHandle) {
        self.push(GpuCommand::SetResourceSet { slot, set });
    }

    /// Write floats into a buffer at this point of the list
    pub fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, floats: &[f32]) {
        self.push(GpuCommand::UpdateBuffer {
            buffer,
            offset,
            data: bytemuck::cast_slice(floats).to_vec(),
        });
    }

    /// Indexed draw
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.push(GpuCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    /// Copy a texture
    pub fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) {
        self.push(GpuCommand::CopyTexture { source, destination });
    }

    /// Number of draw commands recorded
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::DrawIndexed { .. }))
            .count()
    }
}
