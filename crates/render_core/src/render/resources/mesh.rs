//! Mesh data and GPU mesh storage
//!
//! Mesh parsing lives outside the core: hosts hand over already-decoded
//! [`MeshData`] (or GPU buffers they created themselves) under a string key.
//! GPU meshes are reference counted by the entities that draw them and are
//! released when the last one is disposed.

use std::collections::HashMap;

use crate::foundation::math::{Transform, Vec3};
use crate::render::api::{BufferDescription, BufferHandle, BufferUsage, GraphicsDevice, ResourceHandle};
use crate::render::{RenderError, RenderResult};
use crate::spatial::AABB;

/// Floats per vertex in the vertex buffer
pub const VERTEX_FLOATS: usize = 8;

/// Vertex with position, normal and texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

/// Decoded geometry ready for upload
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create mesh data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit cube centered at the origin (vertices at ±1)
    pub fn cube() -> Self {
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]]),
            ([0.0, 0.0, -1.0], [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]]),
            ([1.0, 0.0, 0.0], [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]]),
            ([-1.0, 0.0, 0.0], [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]]),
            ([0.0, 1.0, 0.0], [[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]]),
            ([0.0, -1.0, 0.0], [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]]),
        ];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, corners)) in faces.iter().enumerate() {
            let base = (face * 4) as u32;
            for (corner, uv) in corners.iter().zip(uvs) {
                vertices.push(Vertex::new(*corner, *normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        Self { vertices, indices }
    }

    /// Object-space bounds, `None` for an empty mesh
    pub fn bounds(&self) -> Option<AABB> {
        AABB::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }

    /// Interleaved vertex floats
    pub fn vertex_floats(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vertices.len() * VERTEX_FLOATS);
        for vertex in &self.vertices {
            out.extend_from_slice(&vertex.position);
            out.extend_from_slice(&vertex.normal);
            out.extend_from_slice(&vertex.tex_coord);
        }
        out
    }
}

/// Mesh resident on the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuMesh {
    /// Vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Index buffer
    pub index_buffer: BufferHandle,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of indices
    pub index_count: u32,
    /// Object-space bounds
    pub bounds: AABB,
}

struct MeshEntry {
    mesh: GpuMesh,
    users: usize,
}

/// GPU meshes by key
#[derive(Default)]
pub struct MeshRegistry {
    meshes: HashMap<String, MeshEntry>,
}

impl MeshRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register buffers the host created; replaces an existing key (keeping
    /// its user count) and returns the mesh it held
    pub fn register(&mut self, key: impl Into<String>, mesh: GpuMesh) -> Option<GpuMesh> {
        let key = key.into();
        log::debug!("Registered mesh '{}' ({} indices)", key, mesh.index_count);
        match self.meshes.get_mut(&key) {
            Some(entry) => Some(std::mem::replace(&mut entry.mesh, mesh)),
            None => {
                self.meshes.insert(key, MeshEntry { mesh, users: 0 });
                None
            }
        }
    }

    /// Upload decoded geometry and register it
    pub fn upload(&mut self, device: &mut dyn GraphicsDevice, key: &str, data: &MeshData) -> RenderResult<GpuMesh> {
        let bounds = data
            .bounds()
            .ok_or_else(|| RenderError::MeshNotFound(format!("{key} (no vertices)")))?;

        let vertex_floats = data.vertex_floats();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertex_floats);
        let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);

        let vertex_buffer = device.create_buffer(&BufferDescription {
            size: vertex_bytes.len(),
            usage: BufferUsage::Vertex,
            label: format!("{key}_vertices"),
        })?;
        device.update_buffer(vertex_buffer, 0, vertex_bytes)?;
        let index_buffer = device.create_buffer(&BufferDescription {
            size: index_bytes.len(),
            usage: BufferUsage::Index,
            label: format!("{key}_indices"),
        })?;
        device.update_buffer(index_buffer, 0, index_bytes)?;

        let mesh = GpuMesh {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
            bounds,
        };
        if let Some(previous) = self.register(key, mesh) {
            device.dispose(ResourceHandle::Buffer(previous.vertex_buffer))?;
            device.dispose(ResourceHandle::Buffer(previous.index_buffer))?;
        }
        Ok(mesh)
    }

    /// Mesh by key
    pub fn get(&self, key: &str) -> Option<&GpuMesh> {
        self.meshes.get(key).map(|entry| &entry.mesh)
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.meshes.contains_key(key)
    }

    /// Number of meshes
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether no mesh is registered
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Count one more entity drawing the mesh; `false` if the key is unknown
    pub fn acquire(&mut self, key: &str) -> bool {
        self.meshes.get_mut(key).map_or(false, |entry| {
            entry.users += 1;
            true
        })
    }

    /// Drop one user; the mesh is removed and its buffers returned once no
    /// entity draws it any more
    pub fn release(&mut self, key: &str) -> Vec<ResourceHandle> {
        let Some(entry) = self.meshes.get_mut(key) else {
            return Vec::new();
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return Vec::new();
        }
        self.meshes.remove(key).map_or_else(Vec::new, |entry| {
            log::debug!("Released mesh '{}'", key);
            vec![
                ResourceHandle::Buffer(entry.mesh.vertex_buffer),
                ResourceHandle::Buffer(entry.mesh.index_buffer),
            ]
        })
    }

    /// Remove every mesh, returning its buffers
    pub fn drain_resources(&mut self) -> Vec<ResourceHandle> {
        self.meshes
            .drain()
            .flat_map(|(_, entry)| {
                [
                    ResourceHandle::Buffer(entry.mesh.vertex_buffer),
                    ResourceHandle::Buffer(entry.mesh.index_buffer),
                ]
            })
            .collect()
    }
}

/// One node of a model hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    /// Node name
    pub name: String,
    /// Index into the caller's mesh key list
    pub mesh: Option<usize>,
    /// Transform relative to the parent node
    pub local: Transform,
    /// Parent node index; parents precede their children
    pub parent: Option<usize>,
}

/// Node graph of a decoded model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDescription {
    /// Nodes, parents first
    pub nodes: Vec<ModelNode>,
}

impl ModelDescription {
    /// Single-node model drawing mesh 0
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![ModelNode {
                name: name.into(),
                mesh: Some(0),
                local: Transform::identity(),
                parent: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::HeadlessDevice;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_bounds() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        let bounds = cube.bounds().unwrap();
        assert_relative_eq!(bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_relative_eq!(bounds.max, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_upload_writes_buffers() {
        let mut device = HeadlessDevice::new();
        let mut meshes = MeshRegistry::new();
        let mesh = meshes.upload(&mut device, "cube", &MeshData::cube()).unwrap();

        assert_eq!(mesh.index_count, 36);
        assert_eq!(device.buffer_contents(mesh.index_buffer).map(<[u8]>::len), Some(36 * 4));
        assert!(meshes.contains("cube"));
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut meshes = MeshRegistry::new();
        assert!(meshes.upload(&mut device, "empty", &MeshData::default()).is_err());
    }

    #[test]
    fn test_release_frees_after_last_user() {
        let mut device = HeadlessDevice::new();
        let mut meshes = MeshRegistry::new();
        meshes.upload(&mut device, "cube", &MeshData::cube()).unwrap();
        meshes.acquire("cube");
        meshes.acquire("cube");

        assert!(meshes.release("cube").is_empty());
        assert_eq!(meshes.release("cube").len(), 2);
        assert!(!meshes.contains("cube"));
    }
}
