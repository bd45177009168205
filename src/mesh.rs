use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of scalar components in one interleaved vertex.
pub const VERTEX_STRIDE_FLOATS: usize = 11;

/// Interleaved vertex shared by the importer, the shape generator and GPU upload.
///
/// Attribute slots are positional: 0 position, 1 color, 2 uv, 3 normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            color,
            uv,
            normal,
        }
    }

    fn from_slice(chunk: &[f32]) -> Self {
        Self {
            position: [chunk[0], chunk[1], chunk[2]],
            color: [chunk[3], chunk[4], chunk[5]],
            uv: [chunk[6], chunk[7]],
            normal: [chunk[8], chunk[9], chunk[10]],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("vertex buffer holds {0} floats, not a multiple of 11")]
    RaggedVertices(usize),
    #[error("index buffer holds {0} indices, not a multiple of 3")]
    RaggedIndices(usize),
    #[error("index {index} at position {at} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        at: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// Host-side flat vertex + index buffer pair, prior to upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuMeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl CpuMeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices * VERTEX_STRIDE_FLOATS),
            indices: Vec::with_capacity(indices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE_FLOATS
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, vertex: Vertex) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(bytemuck::cast_slice(&[vertex]));
        index
    }

    pub fn vertex(&self, index: usize) -> Option<Vertex> {
        let start = index * VERTEX_STRIDE_FLOATS;
        self.vertices
            .get(start..start + VERTEX_STRIDE_FLOATS)
            .map(Vertex::from_slice)
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE_FLOATS)
            .map(Vertex::from_slice)
    }

    /// Checks the buffer shape and that every index addresses an existing vertex.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.len() % VERTEX_STRIDE_FLOATS != 0 {
            return Err(MeshError::RaggedVertices(self.vertices.len()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::RaggedIndices(self.indices.len()));
        }
        let vertex_count = self.vertex_count();
        if let Some((at, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfRange {
                at,
                index,
                vertex_count,
            });
        }
        Ok(())
    }
}
