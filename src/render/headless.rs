//! Device-free backend that records what the registry asks of the GPU.
//!
//! Used by `--summary-only` runs and by the tests: every draw captures the
//! uniform values the bound program would see, so the render pass can be
//! checked without a window or adapter.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::Mat4;
use log::warn;

use crate::gpu::{
    GpuBackend, PixelFormat, ProgramId, ShaderProgramRef, UniformLocation, UniformValue,
    VertexAttribute, UNIFORM_MODEL,
};
use crate::mesh::CpuMeshData;
use crate::render::programs::{slot_of, ProgramSpec, UNIFORM_SLOTS};

#[derive(Debug)]
pub struct HeadlessMesh {
    id: u64,
    label: String,
    vertex_count: usize,
}

#[derive(Debug)]
pub struct HeadlessTexture {
    id: u64,
    label: String,
}

/// One recorded indexed draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh: String,
    pub vertex_count: usize,
    pub index_count: u32,
    pub program: ProgramId,
    pub uniforms: HashMap<&'static str, UniformValue>,
    /// Texture on unit 0, recorded only for programs that sample it.
    pub texture: Option<String>,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn model(&self) -> Option<Mat4> {
        match self.uniform(UNIFORM_MODEL)? {
            UniformValue::Mat4(matrix) => Some(matrix),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    programs: HashMap<ProgramId, ProgramSpec>,
    next_program: u64,
    next_resource: u64,
    live_meshes: HashSet<u64>,
    live_textures: HashSet<u64>,
    current: Option<ProgramId>,
    values: HashMap<ProgramId, HashMap<u32, UniformValue>>,
    texture_units: HashMap<u32, String>,
    draws: Vec<DrawCall>,
    program_switches: usize,
    uniform_lookups: Cell<usize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// "Links" a program; the returned reference stays valid until [`Self::delete_program`].
    pub fn register_program(&mut self, spec: &ProgramSpec) -> ShaderProgramRef {
        self.next_program += 1;
        let id = ProgramId(self.next_program);
        self.programs.insert(id, *spec);
        ShaderProgramRef::new(id, spec.name)
    }

    pub fn delete_program(&mut self, program: ShaderProgramRef) {
        self.programs.remove(&program.id);
        self.values.remove(&program.id);
        if self.current == Some(program.id) {
            self.current = None;
        }
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn live_mesh_count(&self) -> usize {
        self.live_meshes.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Drops the recorded draws, e.g. between frames.
    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// Number of [`GpuBackend::use_program`] calls so far.
    pub fn program_switches(&self) -> usize {
        self.program_switches
    }

    /// Number of [`GpuBackend::uniform_location`] queries so far.
    pub fn uniform_lookups(&self) -> usize {
        self.uniform_lookups.get()
    }

    fn next_resource_id(&mut self) -> u64 {
        self.next_resource += 1;
        self.next_resource
    }
}

impl GpuBackend for HeadlessBackend {
    type Mesh = HeadlessMesh;
    type Texture = HeadlessTexture;

    fn create_mesh(
        &mut self,
        label: &str,
        data: &CpuMeshData,
        _layout: &[VertexAttribute],
    ) -> HeadlessMesh {
        let id = self.next_resource_id();
        self.live_meshes.insert(id);
        HeadlessMesh {
            id,
            label: label.to_string(),
            vertex_count: data.vertex_count(),
        }
    }

    fn delete_mesh(&mut self, mesh: HeadlessMesh) {
        self.live_meshes.remove(&mesh.id);
    }

    fn create_texture(
        &mut self,
        label: &str,
        path: &Path,
        _format: PixelFormat,
    ) -> Result<HeadlessTexture> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("cannot read texture {}", path.display()))?;
        if !metadata.is_file() {
            bail!("texture {} is not a file", path.display());
        }
        let id = self.next_resource_id();
        self.live_textures.insert(id);
        Ok(HeadlessTexture {
            id,
            label: label.to_string(),
        })
    }

    fn delete_texture(&mut self, texture: HeadlessTexture) {
        self.live_textures.remove(&texture.id);
    }

    fn use_program(&mut self, program: ShaderProgramRef) {
        self.program_switches += 1;
        self.current = Some(program.id);
    }

    fn uniform_location(&self, program: ShaderProgramRef, name: &str) -> Option<UniformLocation> {
        self.uniform_lookups.set(self.uniform_lookups.get() + 1);
        let spec = self.programs.get(&program.id)?;
        if spec.declares(name) {
            slot_of(name)
        } else {
            None
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.current else {
            warn!("uniform set with no program in use");
            return;
        };
        self.values
            .entry(program)
            .or_default()
            .insert(location.0, value);
    }

    fn bind_texture(&mut self, unit: u32, texture: &HeadlessTexture) {
        self.texture_units.insert(unit, texture.label.clone());
    }

    fn draw_indexed(&mut self, mesh: &HeadlessMesh, index_count: u32) {
        let Some(program) = self.current else {
            warn!("draw of {:?} with no program in use", mesh.label);
            return;
        };
        let samples = self
            .programs
            .get(&program)
            .is_some_and(ProgramSpec::samples_texture);

        let uniforms = self
            .values
            .get(&program)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|(slot, value)| {
                        UNIFORM_SLOTS
                            .get(*slot as usize)
                            .map(|name| (*name, *value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.draws.push(DrawCall {
            mesh: mesh.label.clone(),
            vertex_count: mesh.vertex_count,
            index_count,
            program,
            uniforms,
            texture: if samples {
                self.texture_units.get(&0).cloned()
            } else {
                None
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::VERTEX_ATTRIBUTES;
    use crate::render::programs::{DEFAULT_PROGRAM, OBJECT_PROGRAM};
    use crate::shapes;

    #[test]
    fn lookups_respect_declared_uniforms() {
        let mut gpu = HeadlessBackend::new();
        let lamp = gpu.register_program(&OBJECT_PROGRAM);
        assert_eq!(lamp.label, OBJECT_PROGRAM.name);
        assert!(gpu.uniform_location(lamp, "lightColor").is_some());
        assert_eq!(gpu.uniform_location(lamp, "tex0"), None);
        assert_eq!(gpu.uniform_lookups(), 2);
    }

    #[test]
    fn uniform_values_persist_per_program() {
        let mut gpu = HeadlessBackend::new();
        let default = gpu.register_program(&DEFAULT_PROGRAM);
        let lamp = gpu.register_program(&OBJECT_PROGRAM);
        let mesh = gpu.create_mesh("tri", &shapes::triangle(), &VERTEX_ATTRIBUTES);

        gpu.use_program(default);
        let model = gpu.uniform_location(default, "model").unwrap();
        gpu.set_uniform(model, UniformValue::Mat4(Mat4::from_scale(glam::Vec3::splat(2.0))));
        gpu.use_program(lamp);
        gpu.draw_indexed(&mesh, 3);
        gpu.use_program(default);
        gpu.draw_indexed(&mesh, 3);

        assert_eq!(gpu.draws()[0].model(), None);
        assert_eq!(
            gpu.draws()[1].model(),
            Some(Mat4::from_scale(glam::Vec3::splat(2.0)))
        );
        assert_eq!(gpu.draws()[1].vertex_count, 3);
    }

    #[test]
    fn deleting_a_program_leaves_resources_alone() {
        let mut gpu = HeadlessBackend::new();
        let program = gpu.register_program(&DEFAULT_PROGRAM);
        let mesh = gpu.create_mesh("cube", &shapes::cube(), &VERTEX_ATTRIBUTES);
        gpu.delete_program(program);
        assert_eq!(gpu.program_count(), 0);
        assert_eq!(gpu.live_mesh_count(), 1);
        gpu.delete_mesh(mesh);
        assert_eq!(gpu.live_mesh_count(), 0);
    }
}
