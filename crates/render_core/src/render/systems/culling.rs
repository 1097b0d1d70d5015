//! Frustum culling
//!
//! Once per frame every active drawable is classified against the active
//! camera's frustum. A hidden entity becomes visible on any non-disjoint
//! result; a visible entity only becomes hidden when it is fully disjoint.
//! The entity named by `skybox_name` is always visible. Flag writes are
//! queued in [`VisibilityCommands`] and applied after classification, so the
//! classification itself only needs a snapshot and can run on the rayon pool.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::camera_view::CameraView;
use crate::config::RenderConfig;
use crate::ecs::components::{DrawableComponent, NameComponent, RenderFlags};
use crate::ecs::{Entity, VisibilityCommands, World};
use crate::foundation::math::Vec3;
use crate::render::resources::MeshRegistry;
use crate::spatial::{Containment, Frustum, AABB};

/// Counters from one cull pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Drawables classified against the frustum
    pub classified: usize,
    /// Drawables visible after the pass
    pub visible: usize,
    /// Hidden drawables that became visible
    pub shown: usize,
    /// Visible drawables that became hidden
    pub hidden: usize,
    /// Drawables skipped because their mesh is not registered
    pub inert: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    entity: Entity,
    bounds: AABB,
    visible: bool,
    forced: bool,
}

/// Per-frame visibility classifier
#[derive(Debug)]
pub struct FrustumCuller {
    candidates: Vec<Candidate>,
    results: Vec<Containment>,
    commands: VisibilityCommands,
    skybox_name: String,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
    max_depth: usize,
}

impl FrustumCuller {
    /// Create a culler from the render configuration
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            candidates: Vec::new(),
            results: Vec::new(),
            commands: VisibilityCommands::new(),
            skybox_name: config.skybox_name.clone(),
            parallel: config.parallel_culling,
            max_depth: config.max_hierarchy_depth,
        }
    }

    fn snapshot(&mut self, world: &World, meshes: &MeshRegistry) -> usize {
        self.candidates.clear();
        self.candidates.reserve(world.live_count());
        let mut inert = 0;

        for (entity, drawable) in world.query::<DrawableComponent>() {
            if !world.is_active(entity) {
                continue;
            }
            let Some(flags) = world.get::<RenderFlags>(entity) else {
                continue;
            };
            let forced = world
                .get::<NameComponent>(entity)
                .is_some_and(|name| name.0 == self.skybox_name);

            let Some(mesh) = meshes.get(&drawable.mesh) else {
                if forced {
                    self.candidates.push(Candidate {
                        entity,
                        bounds: AABB::cube(Vec3::zeros(), 0.0),
                        visible: flags.visible,
                        forced,
                    });
                } else {
                    log::trace!("Entity {} has unresolved mesh '{}'; not culled", entity, drawable.mesh);
                    inert += 1;
                }
                continue;
            };

            let bounds = world
                .world_matrix(entity, self.max_depth)
                .map_or(mesh.bounds, |matrix| mesh.bounds.transformed(&matrix));
            self.candidates.push(Candidate {
                entity,
                bounds,
                visible: flags.visible,
                forced,
            });
        }
        inert
    }

    fn classify(&mut self, frustum: &Frustum) {
        #[cfg(feature = "parallel")]
        if self.parallel {
            self.candidates
                .par_iter()
                .map(|candidate| frustum.classify(&candidate.bounds))
                .collect_into_vec(&mut self.results);
            return;
        }

        self.results.clear();
        self.results
            .extend(self.candidates.iter().map(|candidate| frustum.classify(&candidate.bounds)));
    }

    /// Classify every active drawable and update its `visible` flag
    pub fn cull(&mut self, world: &mut World, meshes: &MeshRegistry, camera: &CameraView) -> CullStats {
        let inert = self.snapshot(world, meshes);
        let frustum = Frustum::from_matrix(&camera.view_projection);
        self.classify(&frustum);

        let mut stats = CullStats {
            classified: self.candidates.len(),
            inert,
            ..CullStats::default()
        };
        self.commands.reserve(self.candidates.len());
        for (candidate, containment) in self.candidates.iter().zip(&self.results) {
            // Hidden -> visible on any overlap, visible -> hidden only when disjoint
            let visible = candidate.forced || *containment != Containment::Disjoint;

            if visible != candidate.visible {
                if visible {
                    stats.shown += 1;
                } else {
                    stats.hidden += 1;
                }
                self.commands.push(candidate.entity, visible);
            }
            if visible {
                stats.visible += 1;
            }
        }

        let applied = self.commands.apply(world);
        log::debug!(
            "Culled {} drawables: {} visible ({} shown, {} hidden, {} applied)",
            stats.classified,
            stats.visible,
            stats.shown,
            stats.hidden,
            applied
        );
        stats
    }
}
