//! Deferred visibility writes
//!
//! Classification runs against a shared borrow of the world (possibly on the
//! worker pool); the resulting flag changes are queued here and applied on the
//! frame thread once every entity has been classified.

use super::components::RenderFlags;
use super::{Entity, World};

/// Queue of `(entity, visible)` changes
#[derive(Debug, Default)]
pub struct VisibilityCommands {
    pending: Vec<(Entity, bool)>,
}

impl VisibilityCommands {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for a frame's worth of changes
    pub fn reserve(&mut self, additional: usize) {
        self.pending.reserve(additional);
    }

    /// Queue a visibility change
    pub fn push(&mut self, entity: Entity, visible: bool) {
        self.pending.push((entity, visible));
    }

    /// Number of queued changes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write every queued change into [`RenderFlags`] and empty the queue
    ///
    /// Returns how many entities were updated; entities despawned since
    /// classification are skipped.
    pub fn apply(&mut self, world: &mut World) -> usize {
        let mut applied = 0;
        for (entity, visible) in self.pending.drain(..) {
            if let Some(flags) = world.get_mut::<RenderFlags>(entity) {
                flags.visible = visible;
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_writes_flags_and_drains() {
        let mut world = World::new();
        let shown = world.spawn();
        let gone = world.spawn();
        world.insert(shown, RenderFlags::default());
        world.insert(gone, RenderFlags::default());

        let mut commands = VisibilityCommands::new();
        commands.push(shown, true);
        commands.push(gone, true);
        world.despawn(gone);

        assert_eq!(commands.apply(&mut world), 1);
        assert!(commands.is_empty());
        assert!(world.get::<RenderFlags>(shown).is_some_and(|flags| flags.visible));
    }
}
