//! Capabilities the scene registry needs from a graphics device.
//!
//! The registry never talks to a device directly. Mesh and texture handles
//! are opaque backend types it owns; shader programs are created by the
//! caller and only referenced here by identity.

use std::path::Path;

use anyhow::Result;
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::mesh::{CpuMeshData, VERTEX_STRIDE_FLOATS};

pub const UNIFORM_MODEL: &str = "model";
pub const UNIFORM_TEXTURE: &str = "tex0";
pub const UNIFORM_LIGHT_COLOR: &str = "lightColor";
pub const UNIFORM_LIGHT_POSITION: &str = "lightPos";
pub const UNIFORM_CAMERA_POSITION: &str = "camPos";
pub const UNIFORM_CAMERA_MATRIX: &str = "camMatrix";

/// Stable identity of a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub u64);

/// Non-owning reference to a caller-created shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderProgramRef {
    pub id: ProgramId,
    /// Debug name of the program, used in log output.
    pub label: &'static str,
}

impl ShaderProgramRef {
    pub const fn new(id: ProgramId, label: &'static str) -> Self {
        Self { id, label }
    }
}

/// Where a named uniform lives inside one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgb,
    Rgba,
}

/// One vertex attribute slot inside the interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub slot: u32,
    pub components: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
}

pub const VERTEX_STRIDE_BYTES: u64 = (VERTEX_STRIDE_FLOATS * std::mem::size_of::<f32>()) as u64;

/// position, color, uv, normal.
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        slot: 0,
        components: 3,
        offset: 0,
    },
    VertexAttribute {
        slot: 1,
        components: 3,
        offset: 3 * 4,
    },
    VertexAttribute {
        slot: 2,
        components: 2,
        offset: 6 * 4,
    },
    VertexAttribute {
        slot: 3,
        components: 3,
        offset: 8 * 4,
    },
];

/// Device operations used by [`crate::SceneRegistry`].
pub trait GpuBackend {
    type Mesh;
    type Texture;

    /// Uploads vertex and index data and links the given attribute layout.
    fn create_mesh(
        &mut self,
        label: &str,
        data: &CpuMeshData,
        layout: &[VertexAttribute],
    ) -> Self::Mesh;
    fn delete_mesh(&mut self, mesh: Self::Mesh);

    fn create_texture(
        &mut self,
        label: &str,
        path: &Path,
        format: PixelFormat,
    ) -> Result<Self::Texture>;
    fn delete_texture(&mut self, texture: Self::Texture);

    fn use_program(&mut self, program: ShaderProgramRef);
    /// `None` when the program does not declare the uniform.
    fn uniform_location(&self, program: ShaderProgramRef, name: &str) -> Option<UniformLocation>;
    /// Sets a uniform on the program most recently passed to [`GpuBackend::use_program`].
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);
    fn draw_indexed(&mut self, mesh: &Self::Mesh, index_count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_layout_tiles_the_stride() {
        let mut end = 0;
        for attribute in VERTEX_ATTRIBUTES {
            assert_eq!(attribute.offset, end);
            end += attribute.components as u64 * 4;
        }
        assert_eq!(end, VERTEX_STRIDE_BYTES);
    }
}
