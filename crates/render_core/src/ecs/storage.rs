//! Component storage
//!
//! One dense array per component type, indexed by entity slot. Liveness and
//! generations are tracked by the [`World`](super::World); storages only know
//! slots.

use std::any::Any;

use super::Component;

/// Dense per-type component array
#[derive(Debug)]
pub struct ComponentStorage<T> {
    slots: Vec<Option<T>>,
    len: usize,
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }
}

impl<T> ComponentStorage<T> {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a component in a slot, returning the previous one
    pub fn insert(&mut self, index: u32, component: T) -> Option<T> {
        let index = index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let previous = self.slots[index].replace(component);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Take the component out of a slot
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let removed = self.slots.get_mut(index as usize).and_then(Option::take);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Component in a slot
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    /// Mutable component in a slot
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|component| (index as u32, component)))
    }
}

/// Type-erased view of a storage so the world can clear a slot in every
/// storage on despawn
pub(crate) trait ErasedStorage: Send + Sync {
    fn clear_slot(&mut self, index: u32);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for ComponentStorage<T> {
    fn clear_slot(&mut self, index: u32) {
        self.remove(index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
