//! Frame scheduling
//!
//! Every tick runs a fixed, ordered list of stages:
//!
//! ```text
//! Cull ─► LightRefresh ─► Shadow ─► Forward ─► Present
//! ```
//!
//! Each stage has an enable flag. A disabled stage is skipped and the
//! stages after it work with whatever state it left behind, such as the last
//! visibility flags or the previous shadow matrix. The shadow and forward
//! passes wait for the device to go idle before returning, so every pass is
//! finished before the next one starts.

use super::camera_view::CameraView;
use super::culling::{CullStats, FrustumCuller};
use super::draw::{DrawOrchestrator, DrawStats, ForwardInputs};
use super::light_refresh::LightRefresh;
use super::shadow::{ShadowFrustumFitter, ShadowPass};
use crate::config::RenderConfig;
use crate::ecs::World;
use crate::foundation::time::FrameClock;
use crate::render::api::GraphicsDevice;
use crate::render::resources::materials::MaterialRegistry;
use crate::render::resources::{MeshRegistry, RenderTargets};
use crate::render::RenderResult;
use crate::spatial::LightIndex;

/// A stage of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Frustum culling
    Cull,
    /// Light index synchronization
    LightRefresh,
    /// Shadow fit and shadow depth pass
    Shadow,
    /// Forward pass
    Forward,
    /// Present the frame
    Present,
}

impl FrameStage {
    /// Stages in execution order
    pub const ORDER: [Self; 5] = [Self::Cull, Self::LightRefresh, Self::Shadow, Self::Forward, Self::Present];

    const fn index(self) -> usize {
        match self {
            Self::Cull => 0,
            Self::LightRefresh => 1,
            Self::Shadow => 2,
            Self::Forward => 3,
            Self::Present => 4,
        }
    }

    /// Stage name for logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cull => "cull",
            Self::LightRefresh => "light_refresh",
            Self::Shadow => "shadow",
            Self::Forward => "forward",
            Self::Present => "present",
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Seconds the tick covered
    pub delta_time: f32,
    /// Cull counters
    pub cull: CullStats,
    /// Light index entries changed by the refresh
    pub lights_changed: usize,
    /// Shadow casters drawn
    pub shadow_draws: usize,
    /// Forward pass counters
    pub draw: DrawStats,
    /// Whether a camera was resolved this frame
    pub camera_resolved: bool,
    stages_run: [bool; 5],
}

impl FrameStats {
    /// Whether a stage ran this frame
    pub const fn ran(&self, stage: FrameStage) -> bool {
        self.stages_run[stage.index()]
    }
}

/// Borrowed state a tick works on
pub struct FrameContext<'a> {
    /// Graphics device
    pub device: &'a mut dyn GraphicsDevice,
    /// Entity store
    pub world: &'a mut World,
    /// GPU meshes
    pub meshes: &'a MeshRegistry,
    /// Materials
    pub materials: &'a MaterialRegistry,
    /// Light index
    pub lights: &'a mut LightIndex,
    /// Render targets
    pub targets: &'a RenderTargets,
}

/// Fixed-order frame driver
#[derive(Debug)]
pub struct FrameScheduler {
    enabled: [bool; 5],
    clock: FrameClock,
    culler: FrustumCuller,
    light_refresh: LightRefresh,
    fitter: ShadowFrustumFitter,
    shadow_pass: ShadowPass,
    draw: DrawOrchestrator,
    active_camera: String,
    max_depth: usize,
    warned_no_camera: bool,
}

impl FrameScheduler {
    /// Create a scheduler with every stage enabled
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            enabled: [true; 5],
            clock: FrameClock::new(),
            culler: FrustumCuller::new(config),
            light_refresh: LightRefresh::new(config.max_hierarchy_depth),
            fitter: ShadowFrustumFitter::new(&config.shadow),
            shadow_pass: ShadowPass::new(config.max_hierarchy_depth),
            draw: DrawOrchestrator::new(config),
            active_camera: config.active_camera.clone(),
            max_depth: config.max_hierarchy_depth,
            warned_no_camera: false,
        }
    }

    /// Enable or disable a stage
    pub fn set_stage_enabled(&mut self, stage: FrameStage, enabled: bool) {
        log::debug!("Stage {} {}", stage.name(), if enabled { "enabled" } else { "disabled" });
        self.enabled[stage.index()] = enabled;
    }

    /// Whether a stage is enabled
    pub fn is_stage_enabled(&self, stage: FrameStage) -> bool {
        self.enabled[stage.index()]
    }

    /// Switch the active camera identifier
    pub fn set_active_camera(&mut self, id: impl Into<String>) {
        self.active_camera = id.into();
        self.warned_no_camera = false;
    }

    /// Active camera identifier
    pub fn active_camera(&self) -> &str {
        &self.active_camera
    }

    /// Frame clock
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Shadow fitter (holds the current sun matrix)
    pub fn shadow_fitter(&self) -> &ShadowFrustumFitter {
        &self.fitter
    }

    /// Light tracker, for synchronous re-registration outside the tick
    pub fn light_refresh_mut(&mut self) -> &mut LightRefresh {
        &mut self.light_refresh
    }

    /// Draw orchestrator
    pub fn draw_orchestrator(&self) -> &DrawOrchestrator {
        &self.draw
    }

    /// Mutable draw orchestrator
    pub fn draw_orchestrator_mut(&mut self) -> &mut DrawOrchestrator {
        &mut self.draw
    }

    /// Run one frame
    pub fn tick(&mut self, delta_seconds: f32, ctx: FrameContext<'_>) -> RenderResult<FrameStats> {
        self.clock.advance(delta_seconds);
        let mut stats = FrameStats {
            frame: self.clock.frame_count(),
            delta_time: self.clock.delta_time(),
            ..FrameStats::default()
        };

        let camera = CameraView::resolve(ctx.world, &self.active_camera, self.max_depth);
        stats.camera_resolved = camera.is_some();
        if camera.is_none() && !self.warned_no_camera {
            log::warn!("No active camera '{}'; cull, shadow and forward stages idle", self.active_camera);
            self.warned_no_camera = true;
        } else if camera.is_some() {
            self.warned_no_camera = false;
        }

        for stage in FrameStage::ORDER {
            if !self.enabled[stage.index()] {
                continue;
            }
            match (stage, camera.as_ref()) {
                (FrameStage::Cull, Some(camera)) => {
                    stats.cull = self.culler.cull(ctx.world, ctx.meshes, camera);
                }
                (FrameStage::LightRefresh, _) => {
                    stats.lights_changed = self.light_refresh.refresh(ctx.world, ctx.lights);
                }
                (FrameStage::Shadow, Some(camera)) => {
                    self.fitter.fit(camera, ctx.lights.sun());
                    stats.shadow_draws = self.shadow_pass.render(
                        ctx.device,
                        ctx.world,
                        ctx.meshes,
                        ctx.materials,
                        ctx.targets,
                        self.fitter.light_view_projection(),
                    )?;
                }
                (FrameStage::Forward, Some(camera)) => {
                    let inputs = ForwardInputs {
                        world: ctx.world,
                        meshes: ctx.meshes,
                        materials: ctx.materials,
                        lights: ctx.lights,
                        targets: ctx.targets,
                        camera,
                        light_view_projection: self.fitter.light_view_projection(),
                    };
                    stats.draw = self.draw.render(ctx.device, &inputs)?;
                }
                (FrameStage::Present, _) => ctx.device.present()?,
                (_, None) => continue,
            }
            stats.stages_run[stage.index()] = true;
        }

        log::trace!(
            "Frame {} ({:.4}s): {} visible, {} batches, {} shadow casters",
            stats.frame,
            stats.delta_time,
            stats.cull.visible,
            stats.draw.batches,
            stats.shadow_draws
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::HeadlessDevice;
    use crate::render::resources::materials::ShaderDescriptor;

    #[test]
    fn test_stage_order_is_fixed() {
        assert_eq!(
            FrameStage::ORDER.map(FrameStage::name),
            ["cull", "light_refresh", "shadow", "forward", "present"]
        );
    }

    #[test]
    fn test_disabled_stages_and_missing_camera() {
        let config = RenderConfig::default();
        let mut device = HeadlessDevice::new();
        let targets = RenderTargets::new(&mut device, (16, 16), 16).unwrap();
        let mut materials = MaterialRegistry::new(&mut device, targets.framebuffer, config.max_lights).unwrap();
        materials
            .create_material(
                &mut device,
                ShaderDescriptor::SHADOW_DEPTH,
                &ShaderDescriptor::shadow_depth(),
                Some(targets.shadow_framebuffer),
            )
            .unwrap();
        let meshes = MeshRegistry::new();
        let mut world = World::new();
        let mut lights = LightIndex::new(&config.light_index, config.max_lights);

        let mut scheduler = FrameScheduler::new(&config);
        scheduler.set_stage_enabled(FrameStage::Present, false);
        assert!(!scheduler.is_stage_enabled(FrameStage::Present));

        let stats = scheduler
            .tick(
                0.016,
                FrameContext {
                    device: &mut device,
                    world: &mut world,
                    meshes: &meshes,
                    materials: &materials,
                    lights: &mut lights,
                    targets: &targets,
                },
            )
            .unwrap();

        assert_eq!(stats.frame, 1);
        assert!(!stats.camera_resolved);
        assert!(stats.ran(FrameStage::LightRefresh));
        assert!(!stats.ran(FrameStage::Cull));
        assert!(!stats.ran(FrameStage::Forward));
        assert!(!stats.ran(FrameStage::Present));
        assert_eq!(device.present_count(), 0);
    }
}
