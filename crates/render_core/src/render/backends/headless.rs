//! Headless graphics device
//!
//! A CPU-side [`GraphicsDevice`] that keeps buffer bytes and resource
//! descriptions in generational slot maps, executes submitted command lists in
//! order and records what the GPU would have done: every draw with a snapshot
//! of the uniform buffers bound at that moment, texture copies, presents and
//! the order resources were disposed in. Used by the test suites and for
//! off-screen runs without a window.
//!
//! Draw, copy and submission logs cover one frame: the first submission after
//! a `present` clears them, so a long run keeps only the latest frame.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

use slotmap::SlotMap;

use crate::render::api::{
    BufferDescription, BufferHandle, CommandList, FramebufferDescription, FramebufferHandle, GpuCommand,
    GraphicsDevice, OutputDescription, PipelineDescription, PipelineHandle, ResourceBinding, ResourceHandle,
    ResourceLayoutDescription, ResourceLayoutHandle, ResourceSetDescription, ResourceSetHandle, SamplerDescription,
    SamplerHandle, TextureDescription, TextureHandle,
};
use crate::render::{RenderError, RenderResult};

/// One executed draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Label of the command list that issued it
    pub list: String,
    /// Bound framebuffer
    pub framebuffer: FramebufferHandle,
    /// Bound pipeline
    pub pipeline: PipelineHandle,
    /// Label of the bound pipeline
    pub pipeline_label: String,
    /// Vertex buffers by slot
    pub vertex_buffers: BTreeMap<u32, BufferHandle>,
    /// Bound index buffer
    pub index_buffer: BufferHandle,
    /// Resource sets by slot
    pub resource_sets: BTreeMap<u32, ResourceSetHandle>,
    /// Indices per instance
    pub index_count: u32,
    /// Instance count
    pub instance_count: u32,
    /// Contents of every uniform buffer reachable from the bound sets
    pub uniforms: Vec<(BufferHandle, Vec<f32>)>,
}

impl DrawRecord {
    /// Snapshot of one uniform buffer at draw time
    pub fn uniform(&self, buffer: BufferHandle) -> Option<&[f32]> {
        self.uniforms
            .iter()
            .find(|(handle, _)| *handle == buffer)
            .map(|(_, floats)| floats.as_slice())
    }
}

struct BufferSlot {
    description: BufferDescription,
    data: Vec<u8>,
}

#[derive(Default)]
struct Bindings {
    framebuffer: Option<FramebufferHandle>,
    pipeline: Option<PipelineHandle>,
    vertex_buffers: BTreeMap<u32, BufferHandle>,
    index_buffer: Option<BufferHandle>,
    resource_sets: BTreeMap<u32, ResourceSetHandle>,
}

fn disposed(kind: &'static str, handle: impl Debug) -> RenderError {
    RenderError::ResourceDisposed {
        kind,
        name: format!("{handle:?}"),
    }
}

fn floats_of(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// CPU-side device that records instead of rendering
#[derive(Default)]
pub struct HeadlessDevice {
    buffers: SlotMap<BufferHandle, BufferSlot>,
    textures: SlotMap<TextureHandle, TextureDescription>,
    samplers: SlotMap<SamplerHandle, SamplerDescription>,
    framebuffers: SlotMap<FramebufferHandle, FramebufferDescription>,
    layouts: SlotMap<ResourceLayoutHandle, ResourceLayoutDescription>,
    sets: SlotMap<ResourceSetHandle, ResourceSetDescription>,
    pipelines: SlotMap<PipelineHandle, PipelineDescription>,

    draws: Vec<DrawRecord>,
    copies: Vec<(TextureHandle, TextureHandle)>,
    disposals: Vec<ResourceHandle>,
    disposed: HashSet<ResourceHandle>,
    submissions: Vec<String>,
    frame_open: bool,
    total_draws: usize,
    in_flight: usize,
    idle_waits: usize,
    presents: usize,
    shut_down: bool,
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_running(&self) -> RenderResult<()> {
        if self.shut_down {
            Err(RenderError::Device("device has been shut down".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_buffer(&self, buffer: BufferHandle) -> RenderResult<&BufferSlot> {
        self.buffers.get(buffer).ok_or_else(|| disposed("buffer", buffer))
    }

    fn check_texture(&self, texture: TextureHandle) -> RenderResult<&TextureDescription> {
        self.textures.get(texture).ok_or_else(|| disposed("texture", texture))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> RenderResult<()> {
        let slot = self.buffers.get_mut(buffer).ok_or_else(|| disposed("buffer", buffer))?;
        let end = offset + data.len();
        if end > slot.description.size {
            return Err(RenderError::Device(format!(
                "write of {} bytes at {} overflows buffer '{}' ({} bytes)",
                data.len(),
                offset,
                slot.description.label,
                slot.description.size
            )));
        }
        slot.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn snapshot_uniforms(&self, sets: &BTreeMap<u32, ResourceSetHandle>) -> Vec<(BufferHandle, Vec<f32>)> {
        sets.values()
            .filter_map(|set| self.sets.get(*set))
            .flat_map(|set| set.bindings.iter())
            .filter_map(|binding| match binding {
                ResourceBinding::Buffer(buffer) => self
                    .buffers
                    .get(*buffer)
                    .map(|slot| (*buffer, floats_of(&slot.data))),
                _ => None,
            })
            .collect()
    }

    fn execute(&mut self, list: &CommandList) -> RenderResult<()> {
        let mut bound = Bindings::default();
        for command in list.commands() {
            match command {
                GpuCommand::SetFramebuffer(framebuffer) => {
                    if !self.framebuffers.contains_key(*framebuffer) {
                        return Err(disposed("framebuffer", framebuffer));
                    }
                    bound.framebuffer = Some(*framebuffer);
                }
                GpuCommand::ClearColor(_) | GpuCommand::ClearDepth(_) => {
                    if bound.framebuffer.is_none() {
                        return Err(RenderError::Device(format!("'{}' clears without a framebuffer", list.label())));
                    }
                }
                GpuCommand::SetPipeline(pipeline) => {
                    if !self.pipelines.contains_key(*pipeline) {
                        return Err(disposed("pipeline", pipeline));
                    }
                    bound.pipeline = Some(*pipeline);
                }
                GpuCommand::SetVertexBuffer { slot, buffer } => {
                    self.check_buffer(*buffer)?;
                    bound.vertex_buffers.insert(*slot, *buffer);
                }
                GpuCommand::SetIndexBuffer(buffer) => {
                    self.check_buffer(*buffer)?;
                    bound.index_buffer = Some(*buffer);
                }
                GpuCommand::SetResourceSet { slot, set } => {
                    if !self.sets.contains_key(*set) {
                        return Err(disposed("resource set", set));
                    }
                    bound.resource_sets.insert(*slot, *set);
                }
                GpuCommand::UpdateBuffer { buffer, offset, data } => {
                    self.write_buffer(*buffer, *offset, data)?;
                }
                GpuCommand::DrawIndexed {
                    index_count,
                    instance_count,
                } => {
                    let (Some(framebuffer), Some(pipeline), Some(index_buffer)) =
                        (bound.framebuffer, bound.pipeline, bound.index_buffer)
                    else {
                        return Err(RenderError::Device(format!(
                            "'{}' draws without framebuffer, pipeline and index buffer bound",
                            list.label()
                        )));
                    };
                    let pipeline_label = self
                        .pipelines
                        .get(pipeline)
                        .map(|description| description.label.clone())
                        .ok_or_else(|| disposed("pipeline", pipeline))?;
                    let record = DrawRecord {
                        list: list.label().to_string(),
                        framebuffer,
                        pipeline,
                        pipeline_label,
                        vertex_buffers: bound.vertex_buffers.clone(),
                        index_buffer,
                        resource_sets: bound.resource_sets.clone(),
                        index_count: *index_count,
                        instance_count: *instance_count,
                        uniforms: self.snapshot_uniforms(&bound.resource_sets),
                    };
                    log::trace!(
                        "Headless draw '{}': {} indices x {}",
                        record.pipeline_label,
                        index_count,
                        instance_count
                    );
                    self.draws.push(record);
                    self.total_draws += 1;
                }
                GpuCommand::CopyTexture { source, destination } => {
                    let from = self.check_texture(*source)?;
                    let to = self.check_texture(*destination)?;
                    if (from.width, from.height) != (to.width, to.height) {
                        return Err(RenderError::Device(format!(
                            "copy from '{}' to '{}' with mismatched sizes",
                            from.label, to.label
                        )));
                    }
                    self.copies.push((*source, *destination));
                }
            }
        }
        Ok(())
    }

    /// Draws executed in the current (or last presented) frame
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Take and clear the recorded draws
    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Texture copies executed in the current (or last presented) frame
    pub fn copies(&self) -> &[(TextureHandle, TextureHandle)] {
        &self.copies
    }

    /// Labels of command lists submitted in the current (or last presented)
    /// frame, in order
    pub fn submissions(&self) -> &[String] {
        &self.submissions
    }

    /// Disposed resources, in order
    pub fn disposals(&self) -> &[ResourceHandle] {
        &self.disposals
    }

    /// Whether a resource has been disposed
    pub fn is_disposed(&self, resource: ResourceHandle) -> bool {
        self.disposed.contains(&resource)
    }

    /// Current bytes of a live buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|slot| slot.data.as_slice())
    }

    /// Current contents of a live buffer as floats
    pub fn buffer_floats(&self, buffer: BufferHandle) -> Option<Vec<f32>> {
        self.buffer_contents(buffer).map(floats_of)
    }

    /// Description of a live buffer
    pub fn buffer_description(&self, buffer: BufferHandle) -> Option<&BufferDescription> {
        self.buffers.get(buffer).map(|slot| &slot.description)
    }

    /// Number of live pipelines
    pub fn live_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of live buffers
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of `present` calls
    pub fn present_count(&self) -> usize {
        self.presents
    }

    /// Draws executed since the device was created
    pub fn total_draw_count(&self) -> usize {
        self.total_draws
    }

    /// Number of `wait_for_idle` calls
    pub fn idle_wait_count(&self) -> usize {
        self.idle_waits
    }

    /// Whether `shutdown` has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, description: &BufferDescription) -> RenderResult<BufferHandle> {
        self.ensure_running()?;
        Ok(self.buffers.insert(BufferSlot {
            data: vec![0; description.size],
            description: description.clone(),
        }))
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> RenderResult<()> {
        self.ensure_running()?;
        self.write_buffer(buffer, offset, data)
    }

    fn create_texture(&mut self, description: &TextureDescription) -> RenderResult<TextureHandle> {
        self.ensure_running()?;
        Ok(self.textures.insert(description.clone()))
    }

    fn create_sampler(&mut self, description: &SamplerDescription) -> RenderResult<SamplerHandle> {
        self.ensure_running()?;
        Ok(self.samplers.insert(description.clone()))
    }

    fn create_framebuffer(&mut self, description: &FramebufferDescription) -> RenderResult<FramebufferHandle> {
        self.ensure_running()?;
        for texture in description.color.iter().chain(description.depth.iter()) {
            self.check_texture(*texture)?;
        }
        Ok(self.framebuffers.insert(description.clone()))
    }

    fn framebuffer_outputs(&self, framebuffer: FramebufferHandle) -> RenderResult<OutputDescription> {
        self.ensure_running()?;
        let description = self
            .framebuffers
            .get(framebuffer)
            .ok_or_else(|| disposed("framebuffer", framebuffer))?;
        let format = |texture: Option<TextureHandle>| -> RenderResult<_> {
            texture
                .map(|texture| self.check_texture(texture).map(|t| t.format))
                .transpose()
        };
        Ok(OutputDescription {
            color: format(description.color)?,
            depth: format(description.depth)?,
        })
    }

    fn create_resource_layout(&mut self, description: &ResourceLayoutDescription) -> RenderResult<ResourceLayoutHandle> {
        self.ensure_running()?;
        Ok(self.layouts.insert(description.clone()))
    }

    fn create_resource_set(&mut self, description: &ResourceSetDescription) -> RenderResult<ResourceSetHandle> {
        self.ensure_running()?;
        let layout = self
            .layouts
            .get(description.layout)
            .ok_or_else(|| disposed("resource layout", description.layout))?;
        if layout.elements.len() != description.bindings.len() {
            return Err(RenderError::Device(format!(
                "resource set has {} bindings, layout expects {}",
                description.bindings.len(),
                layout.elements.len()
            )));
        }
        for (element, binding) in layout.elements.iter().zip(&description.bindings) {
            if element.kind != binding.kind() {
                return Err(RenderError::Device(format!(
                    "binding '{}' expects {:?}, got {:?}",
                    element.name,
                    element.kind,
                    binding.kind()
                )));
            }
            match binding {
                ResourceBinding::Buffer(buffer) => {
                    self.check_buffer(*buffer)?;
                }
                ResourceBinding::Texture(texture) => {
                    self.check_texture(*texture)?;
                }
                ResourceBinding::Sampler(sampler) => {
                    if !self.samplers.contains_key(*sampler) {
                        return Err(disposed("sampler", sampler));
                    }
                }
            }
        }
        Ok(self.sets.insert(description.clone()))
    }

    fn create_pipeline(&mut self, description: &PipelineDescription) -> RenderResult<PipelineHandle> {
        self.ensure_running()?;
        for layout in &description.layouts {
            if !self.layouts.contains_key(*layout) {
                return Err(disposed("resource layout", layout));
            }
        }
        Ok(self.pipelines.insert(description.clone()))
    }

    fn submit_commands(&mut self, commands: &CommandList) -> RenderResult<()> {
        self.ensure_running()?;
        if commands.is_recording() {
            return Err(RenderError::Device(format!(
                "'{}' submitted while still recording",
                commands.label()
            )));
        }
        if !self.frame_open {
            self.draws.clear();
            self.copies.clear();
            self.submissions.clear();
            self.frame_open = true;
        }
        self.execute(commands)?;
        self.submissions.push(commands.label().to_string());
        self.in_flight += 1;
        Ok(())
    }

    fn wait_for_idle(&mut self) -> RenderResult<()> {
        self.ensure_running()?;
        self.in_flight = 0;
        self.idle_waits += 1;
        Ok(())
    }

    fn present(&mut self) -> RenderResult<()> {
        self.ensure_running()?;
        self.presents += 1;
        self.frame_open = false;
        Ok(())
    }

    fn dispose(&mut self, resource: ResourceHandle) -> RenderResult<()> {
        self.ensure_running()?;
        let removed = match resource {
            ResourceHandle::Buffer(handle) => self.buffers.remove(handle).is_some(),
            ResourceHandle::Texture(handle) => self.textures.remove(handle).is_some(),
            ResourceHandle::Sampler(handle) => self.samplers.remove(handle).is_some(),
            ResourceHandle::Framebuffer(handle) => self.framebuffers.remove(handle).is_some(),
            ResourceHandle::ResourceLayout(handle) => self.layouts.remove(handle).is_some(),
            ResourceHandle::ResourceSet(handle) => self.sets.remove(handle).is_some(),
            ResourceHandle::Pipeline(handle) => self.pipelines.remove(handle).is_some(),
        };
        if !removed {
            return Err(disposed(resource.kind(), resource));
        }
        self.disposed.insert(resource);
        self.disposals.push(resource);
        Ok(())
    }

    fn shutdown(&mut self) -> RenderResult<()> {
        self.ensure_running()?;
        if self.in_flight > 0 {
            log::warn!("Headless device shut down with {} lists in flight", self.in_flight);
        }
        let leaked = self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.framebuffers.len()
            + self.layouts.len()
            + self.sets.len()
            + self.pipelines.len();
        if leaked > 0 {
            log::warn!("Headless device shut down with {} live resources", leaked);
        }
        self.shut_down = true;
        log::info!("Headless device shut down after {} draws", self.total_draws);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{BufferUsage, TextureFormat, TextureUsage};

    fn uniform(size: usize) -> BufferDescription {
        BufferDescription {
            size,
            usage: BufferUsage::Uniform,
            label: "test".into(),
        }
    }

    #[test]
    fn test_buffer_writes_are_bounds_checked() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&uniform(8)).unwrap();

        device.update_buffer(buffer, 4, &1.5f32.to_ne_bytes()).unwrap();
        assert_eq!(device.buffer_floats(buffer), Some(vec![0.0, 1.5]));
        assert!(matches!(
            device.update_buffer(buffer, 6, &[0; 4]),
            Err(RenderError::Device(_))
        ));
    }

    #[test]
    fn test_use_after_dispose_is_reported() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&uniform(4)).unwrap();
        device.dispose(ResourceHandle::Buffer(buffer)).unwrap();

        assert!(device.is_disposed(ResourceHandle::Buffer(buffer)));
        assert!(matches!(
            device.update_buffer(buffer, 0, &[0; 4]),
            Err(RenderError::ResourceDisposed { kind: "buffer", .. })
        ));
        assert!(device.dispose(ResourceHandle::Buffer(buffer)).is_err());
    }

    #[test]
    fn test_draw_snapshots_inline_uniform_writes() {
        let mut device = HeadlessDevice::new();
        let target = device
            .create_texture(&TextureDescription {
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8,
                usage: TextureUsage::RenderTarget,
                label: "target".into(),
            })
            .unwrap();
        let framebuffer = device
            .create_framebuffer(&FramebufferDescription {
                color: Some(target),
                depth: None,
                label: "fb".into(),
            })
            .unwrap();
        let block = device.create_buffer(&uniform(4)).unwrap();
        let indices = device
            .create_buffer(&BufferDescription {
                size: 12,
                usage: BufferUsage::Index,
                label: "indices".into(),
            })
            .unwrap();
        let layout = device
            .create_resource_layout(&ResourceLayoutDescription {
                elements: vec![crate::render::api::ResourceLayoutElement {
                    name: "block".into(),
                    kind: crate::render::resources::materials::ResourceKind::UniformBuffer,
                }],
            })
            .unwrap();
        let set = device
            .create_resource_set(&ResourceSetDescription {
                layout,
                bindings: vec![ResourceBinding::Buffer(block)],
            })
            .unwrap();
        let pipeline = device
            .create_pipeline(&PipelineDescription {
                label: "p".into(),
                state: Default::default(),
                stages: Vec::new(),
                layouts: vec![layout],
                outputs: OutputDescription::default(),
                instanced: false,
            })
            .unwrap();

        let mut list = CommandList::new("frame");
        list.begin();
        list.set_framebuffer(framebuffer);
        list.set_pipeline(pipeline);
        list.set_index_buffer(indices);
        list.set_resource_set(0, set);
        list.update_buffer(block, 0, &[1.0]);
        list.draw_indexed(3, 1);
        list.update_buffer(block, 0, &[2.0]);
        list.draw_indexed(3, 1);
        list.end();
        device.submit_commands(&list).unwrap();

        let draws = device.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].uniform(block), Some(&[1.0][..]));
        assert_eq!(draws[1].uniform(block), Some(&[2.0][..]));
    }

    #[test]
    fn test_calls_fail_after_shutdown() {
        let mut device = HeadlessDevice::new();
        device.shutdown().unwrap();
        assert!(device.is_shut_down());
        assert!(device.create_buffer(&uniform(4)).is_err());
        assert!(device.shutdown().is_err());
    }

    #[test]
    fn test_logs_cover_only_the_latest_frame() {
        let mut device = HeadlessDevice::new();
        let texture = |label: &str| TextureDescription {
            width: 4,
            height: 4,
            format: TextureFormat::Rgba8,
            usage: TextureUsage::Sampled,
            label: label.into(),
        };
        let source = device.create_texture(&texture("source")).unwrap();
        let destination = device.create_texture(&texture("destination")).unwrap();

        for label in ["first", "second"] {
            let mut list = CommandList::new(label);
            list.begin();
            list.copy_texture(source, destination);
            list.end();
            device.submit_commands(&list).unwrap();
            device.submit_commands(&list).unwrap();
            device.present().unwrap();

            assert_eq!(device.copies().len(), 2);
            assert_eq!(device.submissions(), &[label.to_string(), label.to_string()][..]);
        }
        assert_eq!(device.present_count(), 2);
    }
}
