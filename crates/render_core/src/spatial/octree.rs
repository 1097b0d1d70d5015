//! Octree spatial partitioning structure
//!
//! Nodes live in one arena (`Vec<OctreeNode>`) and refer to their children by
//! index, so the tree never holds owning pointers. Entries are placed by the
//! center of their bounds; queries widen each node by the largest entry
//! extent seen so that entries spilling out of their node are still found.
//!
//! Capacity is fixed at construction. Inserting past it is refused and
//! logged, never an error.

use std::collections::HashMap;
use std::hash::Hash;

use super::bounds::AABB;
use crate::foundation::math::Vec3;

/// Configuration for octree behavior
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum entries per node before subdivision
    pub max_entries_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node half-size (prevents excessive subdivision)
    pub min_node_size: f32,

    /// Maximum number of entries held at once
    pub capacity: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entries_per_node: 8,
            max_depth: 6,
            min_node_size: 1.0,
            capacity: 1024,
        }
    }
}

/// Entry stored in the octree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeEntry<K> {
    /// Caller's key
    pub key: K,
    /// World-space bounds of the entry
    pub bounds: AABB,
    /// Caller-supplied ordering value (e.g. registration order)
    pub sequence: u64,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
struct OctreeNode<K> {
    bounds: AABB,
    entries: Vec<OctreeEntry<K>>,
    children: Option<[u32; 8]>,
    depth: u32,
}

impl<K> OctreeNode<K> {
    fn new(bounds: AABB, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Node(u32),
    Outlier,
}

/// Get the octant index (0-7) of a position relative to a node center
///
/// Bit 0 selects +X, bit 1 +Y, bit 2 +Z.
fn octant_index(center: Vec3, position: Vec3) -> usize {
    let x_bit = usize::from(position.x >= center.x);
    let y_bit = usize::from(position.y >= center.y);
    let z_bit = usize::from(position.z >= center.z);
    (z_bit << 2) | (y_bit << 1) | x_bit
}

/// Arena-allocated octree keyed by `K`
#[derive(Debug, Clone)]
pub struct Octree<K> {
    nodes: Vec<OctreeNode<K>>,
    outliers: Vec<OctreeEntry<K>>,
    slots: HashMap<K, Slot>,
    config: OctreeConfig,
    max_extent: f32,
    capacity_warned: bool,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> Octree<K> {
    /// Create a new octree covering the given world bounds
    pub fn new(world_bounds: AABB, config: OctreeConfig) -> Self {
        Self {
            nodes: vec![OctreeNode::new(world_bounds, 0)],
            outliers: Vec::new(),
            slots: HashMap::new(),
            config,
            max_extent: 0.0,
            capacity_warned: false,
        }
    }

    /// Bounds of the root node
    pub fn world_bounds(&self) -> AABB {
        self.nodes[0].bounds
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fixed entry capacity
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of allocated nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether a key is stored
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Insert an entry, replacing any entry with the same key
    ///
    /// Returns `false` when the tree is full.
    pub fn insert(&mut self, key: K, bounds: AABB, sequence: u64) -> bool {
        self.remove(&key);

        if self.slots.len() >= self.config.capacity {
            if !self.capacity_warned {
                log::warn!(
                    "Octree capacity of {} entries reached; dropping {:?} and any further inserts",
                    self.config.capacity,
                    key
                );
                self.capacity_warned = true;
            }
            return false;
        }

        let entry = OctreeEntry { key, bounds, sequence };
        self.max_extent = self.max_extent.max(bounds.extents().max());

        if !self.nodes[0].bounds.contains_point(bounds.center()) {
            log::trace!("Entry {:?} lies outside the octree bounds; kept as an outlier", key);
            self.outliers.push(entry);
            self.slots.insert(key, Slot::Outlier);
            return true;
        }

        let node = self.insert_into_tree(entry);
        self.slots.insert(key, Slot::Node(node));
        true
    }

    fn insert_into_tree(&mut self, entry: OctreeEntry<K>) -> u32 {
        let position = entry.bounds.center();
        let mut index = 0u32;
        loop {
            let node = &self.nodes[index as usize];
            if let Some(children) = node.children {
                index = children[octant_index(node.bounds.center(), position)];
                continue;
            }

            let should_subdivide = node.entries.len() >= self.config.max_entries_per_node
                && node.depth < self.config.max_depth
                && node.bounds.extents().x > self.config.min_node_size;

            if should_subdivide {
                self.subdivide(index);
                continue;
            }

            self.nodes[index as usize].entries.push(entry);
            return index;
        }
    }

    /// Split a leaf into eight children and push its entries down
    fn subdivide(&mut self, index: u32) {
        let (bounds, depth) = {
            let node = &self.nodes[index as usize];
            (node.bounds, node.depth)
        };
        let center = bounds.center();
        let quarter_extents = bounds.extents() * 0.5;

        let first_child = self.nodes.len() as u32;
        let mut children = [0u32; 8];
        for (octant, child) in children.iter_mut().enumerate() {
            let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
            let child_center = Vec3::new(
                center.x + quarter_extents.x * sign(1),
                center.y + quarter_extents.y * sign(2),
                center.z + quarter_extents.z * sign(4),
            );
            *child = first_child + octant as u32;
            self.nodes.push(OctreeNode::new(
                AABB::from_center_extents(child_center, quarter_extents),
                depth + 1,
            ));
        }

        let entries = std::mem::take(&mut self.nodes[index as usize].entries);
        self.nodes[index as usize].children = Some(children);
        for entry in entries {
            let child = children[octant_index(center, entry.bounds.center())];
            self.nodes[child as usize].entries.push(entry);
            self.slots.insert(entry.key, Slot::Node(child));
        }
    }

    /// Remove an entry by key
    pub fn remove(&mut self, key: &K) -> Option<OctreeEntry<K>> {
        let entries = match self.slots.remove(key)? {
            Slot::Node(index) => &mut self.nodes[index as usize].entries,
            Slot::Outlier => &mut self.outliers,
        };
        let position = entries.iter().position(|entry| entry.key == *key)?;
        Some(entries.swap_remove(position))
    }

    /// Stored entry for a key
    pub fn get(&self, key: &K) -> Option<&OctreeEntry<K>> {
        let entries = match self.slots.get(key)? {
            Slot::Node(index) => &self.nodes[*index as usize].entries,
            Slot::Outlier => &self.outliers,
        };
        entries.iter().find(|entry| entry.key == *key)
    }

    /// Append every entry whose bounds intersect `query` to `results`
    pub fn query_aabb(&self, query: &AABB, results: &mut Vec<OctreeEntry<K>>) {
        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.expanded(self.max_extent).intersects(query) {
                continue;
            }
            results.extend(node.entries.iter().filter(|entry| entry.bounds.intersects(query)));
            if let Some(children) = node.children {
                stack.extend_from_slice(&children);
            }
        }
        results.extend(self.outliers.iter().filter(|entry| entry.bounds.intersects(query)));
    }

    /// Drop every entry and collapse back to a single root node
    pub fn clear(&mut self) {
        let bounds = self.world_bounds();
        self.nodes.clear();
        self.nodes.push(OctreeNode::new(bounds, 0));
        self.outliers.clear();
        self.slots.clear();
        self.max_extent = 0.0;
        self.capacity_warned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> AABB {
        AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0))
    }

    #[test]
    fn test_octree_basic_insertion() {
        let mut octree = Octree::new(world(), OctreeConfig::default());

        assert!(octree.insert(1u32, AABB::cube(Vec3::zeros(), 1.0), 0));
        assert_eq!(octree.len(), 1);
        assert!(octree.contains(&1));
    }

    #[test]
    fn test_octree_subdivision_keeps_entries_reachable() {
        let config = OctreeConfig {
            max_entries_per_node: 4,
            max_depth: 3,
            ..Default::default()
        };
        let mut octree = Octree::new(world(), config);

        for key in 0..10u32 {
            let x = key as f32 * 15.0 - 70.0;
            octree.insert(key, AABB::cube(Vec3::new(x, 5.0, -5.0), 1.0), u64::from(key));
        }

        assert_eq!(octree.len(), 10);
        assert!(octree.node_count() > 1);
        for key in 0..10u32 {
            assert!(octree.get(&key).is_some(), "entry {key} lost after subdivision");
        }
    }

    #[test]
    fn test_octree_coincident_entries_stop_at_max_depth() {
        let config = OctreeConfig {
            max_entries_per_node: 2,
            max_depth: 3,
            ..Default::default()
        };
        let mut octree = Octree::new(world(), config);
        for key in 0..20u32 {
            octree.insert(key, AABB::cube(Vec3::new(1.0, 1.0, 1.0), 0.5), 0);
        }
        assert_eq!(octree.len(), 20);
        assert_eq!(octree.node_count(), 1 + 8 * 3);
    }

    #[test]
    fn test_octree_query_finds_large_entry_from_neighbour_node() {
        let config = OctreeConfig {
            max_entries_per_node: 1,
            ..Default::default()
        };
        let mut octree = Octree::new(world(), config);
        // Wide entry stored in the +X half, reaching well into -X
        octree.insert(1u32, AABB::cube(Vec3::new(10.0, 0.0, 0.0), 30.0), 0);
        octree.insert(2u32, AABB::cube(Vec3::new(60.0, 60.0, 60.0), 1.0), 1);

        let mut results = Vec::new();
        octree.query_aabb(&AABB::cube(Vec3::new(-15.0, 0.0, 0.0), 1.0), &mut results);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, 1);
    }

    #[test]
    fn test_octree_remove_and_outliers() {
        let mut octree = Octree::new(world(), OctreeConfig::default());
        octree.insert(1u32, AABB::cube(Vec3::new(500.0, 0.0, 0.0), 2.0), 0);
        octree.insert(2u32, AABB::cube(Vec3::zeros(), 2.0), 1);

        let mut results = Vec::new();
        octree.query_aabb(&AABB::cube(Vec3::new(500.0, 0.0, 0.0), 1.0), &mut results);
        assert_eq!(results.len(), 1);

        assert!(octree.remove(&1).is_some());
        assert!(octree.remove(&1).is_none());
        assert_eq!(octree.len(), 1);
    }

    #[test]
    fn test_octree_capacity_is_enforced() {
        let config = OctreeConfig {
            capacity: 2,
            ..Default::default()
        };
        let mut octree = Octree::new(world(), config);

        assert!(octree.insert(1u32, AABB::cube(Vec3::zeros(), 1.0), 0));
        assert!(octree.insert(2u32, AABB::cube(Vec3::zeros(), 1.0), 1));
        assert!(!octree.insert(3u32, AABB::cube(Vec3::zeros(), 1.0), 2));
        // Re-inserting an existing key does not need a free slot
        assert!(octree.insert(2u32, AABB::cube(Vec3::new(1.0, 0.0, 0.0), 1.0), 1));
        assert_eq!(octree.len(), 2);
    }
}
