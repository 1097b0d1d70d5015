//! Spatial data structures
//!
//! Bounding volumes, frustum classification, an arena octree, and the light
//! index built on top of it.

pub mod bounds;
pub mod light_index;
pub mod octree;

pub use bounds::{Containment, Frustum, Plane, AABB};
pub use light_index::{LightIndex, LightRecord, LIGHT_RECORD_FLOATS};
pub use octree::{Octree, OctreeConfig, OctreeEntry};
