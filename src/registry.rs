use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};
use thiserror::Error;

use crate::gpu::{
    GpuBackend, PixelFormat, ProgramId, ShaderProgramRef, UniformLocation, UniformValue,
    UNIFORM_CAMERA_MATRIX, UNIFORM_CAMERA_POSITION, UNIFORM_LIGHT_COLOR, UNIFORM_LIGHT_POSITION,
    UNIFORM_MODEL, UNIFORM_TEXTURE, VERTEX_ATTRIBUTES,
};
use crate::mesh::{CpuMeshData, MeshError};
use crate::render::{CameraParams, FrameContext, LightParams};
use crate::scene::{Motion, SceneObject};
use crate::shapes::{self, ShapeType};

/// Rate of the second axis of [`Motion::RotateXY`] relative to the first.
const SECOND_AXIS_RATE: f32 = 0.7;
const TEXTURE_UNIT: u32 = 0;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("mesh {id:?} is malformed")]
    InvalidMesh {
        id: String,
        #[source]
        source: MeshError,
    },
    #[error("failed to create texture {id:?}")]
    Texture {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Uniform locations of one program, resolved once and kept for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderUniforms {
    pub model: Option<UniformLocation>,
    pub texture: Option<UniformLocation>,
    pub light_color: Option<UniformLocation>,
    pub light_position: Option<UniformLocation>,
    pub camera_position: Option<UniformLocation>,
}

/// Counters describing one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub drawn: usize,
    pub skipped: usize,
    pub program_switches: usize,
}

struct GpuMesh<M> {
    handle: M,
    index_count: u32,
}

/// Owns GPU meshes and textures, references shader programs, and renders a
/// flat list of named object instances.
///
/// Resources are addressed by string id and registered first-wins; objects
/// reference them by id so many instances can share one mesh.
pub struct SceneRegistry<B: GpuBackend> {
    meshes: Vec<GpuMesh<B::Mesh>>,
    mesh_by_id: HashMap<String, usize>,
    textures: Vec<B::Texture>,
    texture_by_id: HashMap<String, usize>,
    shader_by_id: HashMap<String, ShaderProgramRef>,
    uniforms_by_program: HashMap<ProgramId, ShaderUniforms>,
    objects: Vec<SceneObject>,
    object_by_name: HashMap<String, usize>,
    light: LightParams,
}

impl<B: GpuBackend> Default for SceneRegistry<B> {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            mesh_by_id: HashMap::new(),
            textures: Vec::new(),
            texture_by_id: HashMap::new(),
            shader_by_id: HashMap::new(),
            uniforms_by_program: HashMap::new(),
            objects: Vec::new(),
            object_by_name: HashMap::new(),
            light: LightParams::default(),
        }
    }
}

impl<B: GpuBackend> SceneRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads `data` under `id`. Returns `false` when the id is already taken.
    pub fn add_mesh(
        &mut self,
        gpu: &mut B,
        id: &str,
        data: &CpuMeshData,
    ) -> Result<bool, RegistryError> {
        if self.mesh_by_id.contains_key(id) {
            debug!("mesh {id:?} already registered; keeping the first");
            return Ok(false);
        }
        data.validate().map_err(|source| RegistryError::InvalidMesh {
            id: id.to_string(),
            source,
        })?;

        let handle = gpu.create_mesh(id, data, &VERTEX_ATTRIBUTES);
        self.meshes.push(GpuMesh {
            handle,
            index_count: data.indices.len() as u32,
        });
        self.mesh_by_id.insert(id.to_string(), self.meshes.len() - 1);
        debug!(
            "registered mesh {id:?} ({} vertices, {} indices)",
            data.vertex_count(),
            data.indices.len()
        );
        Ok(true)
    }

    pub fn add_primitive_mesh(
        &mut self,
        gpu: &mut B,
        id: &str,
        shape: ShapeType,
    ) -> Result<bool, RegistryError> {
        if self.mesh_by_id.contains_key(id) {
            return Ok(false);
        }
        self.add_mesh(gpu, id, &shapes::generate(shape))
    }

    /// Creates a texture from an image file. Returns `false` when the id is already taken.
    pub fn add_texture(
        &mut self,
        gpu: &mut B,
        id: &str,
        path: impl AsRef<Path>,
        format: PixelFormat,
    ) -> Result<bool, RegistryError> {
        if self.texture_by_id.contains_key(id) {
            return Ok(false);
        }
        let texture = gpu
            .create_texture(id, path.as_ref(), format)
            .map_err(|source| RegistryError::Texture {
                id: id.to_string(),
                source: source.into(),
            })?;
        self.textures.push(texture);
        self.texture_by_id
            .insert(id.to_string(), self.textures.len() - 1);
        debug!("registered texture {id:?} from {}", path.as_ref().display());
        Ok(true)
    }

    /// References a caller-owned program. The first registration of an id wins.
    pub fn register_shader_program(&mut self, id: &str, program: ShaderProgramRef) -> bool {
        if self.shader_by_id.contains_key(id) {
            return false;
        }
        self.shader_by_id.insert(id.to_string(), program);
        true
    }

    pub fn has_mesh(&self, id: &str) -> bool {
        self.mesh_by_id.contains_key(id)
    }

    pub fn has_texture(&self, id: &str) -> bool {
        self.texture_by_id.contains_key(id)
    }

    pub fn shader_program(&self, id: &str) -> Option<ShaderProgramRef> {
        self.shader_by_id.get(id).copied()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn set_light_params(&mut self, color: Vec4, position: Vec3) {
        self.light = LightParams { color, position };
    }

    pub fn light(&self) -> LightParams {
        self.light
    }

    /// Appends an instance, capturing its position as the animation base.
    ///
    /// The returned index stays valid until [`SceneRegistry::shutdown`]. When
    /// the name is already in use the new instance is still stored, but
    /// lookups by name keep resolving to the first one.
    pub fn add_object_instance(&mut self, mut object: SceneObject) -> usize {
        object.base_position = object.position;
        let index = self.objects.len();
        if self.object_by_name.contains_key(&object.name) {
            warn!(
                "object name {:?} is already in use; lookups keep returning the first instance",
                object.name
            );
        } else {
            self.object_by_name.insert(object.name.clone(), index);
        }
        self.objects.push(object);
        index
    }

    pub fn find_object(&self, name: &str) -> Option<&SceneObject> {
        self.object_by_name
            .get(name)
            .map(|&index| &self.objects[index])
    }

    pub fn find_object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        let index = *self.object_by_name.get(name)?;
        self.objects.get_mut(index)
    }

    /// Moves the named object; returns `false` when no object has that name.
    pub fn set_object_position(&mut self, name: &str, position: Vec3) -> bool {
        match self.find_object_mut(name) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    pub fn object(&self, index: usize) -> Option<&SceneObject> {
        self.objects.get(index)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// World position at time `t`: the bob offset for bobbing objects, the
    /// current position otherwise.
    pub fn world_position(object: &SceneObject, t: f32) -> Vec3 {
        match object.motion {
            Motion::Bob {
                amplitude,
                frequency,
            } => object.base_position + Vec3::new(0.0, amplitude * (t * frequency).sin(), 0.0),
            _ => object.position,
        }
    }

    /// World position of the named object, or the origin when it does not exist.
    pub fn world_position_by_name(&self, name: &str, t: f32) -> Vec3 {
        self.find_object(name)
            .map(|object| Self::world_position(object, t))
            .unwrap_or(Vec3::ZERO)
    }

    /// Translation, then time-based rotation, then scale.
    pub fn model_matrix(object: &SceneObject, t: f32) -> Mat4 {
        let translation = Mat4::from_translation(Self::world_position(object, t));
        let rotation = match object.motion {
            Motion::RotateX { speed_deg } => Mat4::from_rotation_x((t * speed_deg).to_radians()),
            Motion::RotateY { speed_deg } => Mat4::from_rotation_y((t * speed_deg).to_radians()),
            Motion::RotateXY { speed_deg } => {
                Mat4::from_rotation_x((t * speed_deg).to_radians())
                    * Mat4::from_rotation_y((t * speed_deg * SECOND_AXIS_RATE).to_radians())
            }
            Motion::None | Motion::Bob { .. } => Mat4::IDENTITY,
        };
        translation * rotation * Mat4::from_scale(object.scale)
    }

    /// Frame context built from the stored light.
    pub fn frame(&self, time: f32, camera: CameraParams) -> FrameContext {
        FrameContext {
            time,
            camera,
            light: self.light,
        }
    }

    /// Draws every object in registration order.
    ///
    /// Objects whose mesh or shader id does not resolve are skipped. The
    /// program and its camera state are only rebound when the resolved
    /// program differs from the previous object's.
    pub fn render(&mut self, gpu: &mut B, frame: &FrameContext) -> RenderStats {
        let mut stats = RenderStats::default();
        let mut current: Option<(ProgramId, ShaderUniforms)> = None;

        for object in &self.objects {
            let Some(&mesh_index) = self.mesh_by_id.get(&object.mesh) else {
                stats.skipped += 1;
                continue;
            };
            let Some(&program) = self.shader_by_id.get(&object.shader) else {
                stats.skipped += 1;
                continue;
            };

            let uniforms = match current {
                Some((id, uniforms)) if id == program.id => uniforms,
                _ => {
                    gpu.use_program(program);
                    if let Some(location) = gpu.uniform_location(program, UNIFORM_CAMERA_MATRIX) {
                        gpu.set_uniform(location, UniformValue::Mat4(frame.camera.view_proj));
                    }
                    let uniforms =
                        resolve_uniforms(&mut self.uniforms_by_program, gpu, program);
                    if let Some(location) = uniforms.texture {
                        gpu.set_uniform(location, UniformValue::Int(TEXTURE_UNIT as i32));
                    }
                    stats.program_switches += 1;
                    current = Some((program.id, uniforms));
                    uniforms
                }
            };

            if let Some(location) = uniforms.light_color {
                gpu.set_uniform(location, UniformValue::Vec4(frame.light.color));
            }
            if let Some(location) = uniforms.light_position {
                gpu.set_uniform(location, UniformValue::Vec3(frame.light.position));
            }
            if let Some(location) = uniforms.camera_position {
                gpu.set_uniform(location, UniformValue::Vec3(frame.camera.position));
            }
            if let Some(location) = uniforms.model {
                gpu.set_uniform(
                    location,
                    UniformValue::Mat4(Self::model_matrix(object, frame.time)),
                );
            }
            if uniforms.texture.is_some() {
                if let Some(&texture_index) = self.texture_by_id.get(&object.texture) {
                    gpu.bind_texture(TEXTURE_UNIT, &self.textures[texture_index]);
                }
            }

            let mesh = &self.meshes[mesh_index];
            gpu.draw_indexed(&mesh.handle, mesh.index_count);
            stats.drawn += 1;
        }

        stats
    }

    /// Releases owned meshes and textures and forgets every registration.
    ///
    /// Shader programs belong to the caller and are left untouched.
    pub fn shutdown(&mut self, gpu: &mut B) {
        debug!(
            "releasing {} meshes and {} textures",
            self.meshes.len(),
            self.textures.len()
        );
        for mesh in self.meshes.drain(..) {
            gpu.delete_mesh(mesh.handle);
        }
        for texture in self.textures.drain(..) {
            gpu.delete_texture(texture);
        }
        self.mesh_by_id.clear();
        self.texture_by_id.clear();
        self.shader_by_id.clear();
        self.uniforms_by_program.clear();
        self.objects.clear();
        self.object_by_name.clear();
    }
}

/// Memoized per program identity; programs are never relinked during a run.
fn resolve_uniforms<B: GpuBackend>(
    cache: &mut HashMap<ProgramId, ShaderUniforms>,
    gpu: &B,
    program: ShaderProgramRef,
) -> ShaderUniforms {
    *cache.entry(program.id).or_insert_with(|| {
        debug!("resolving uniforms of program {:?}", program.label);
        ShaderUniforms {
            model: gpu.uniform_location(program, UNIFORM_MODEL),
            texture: gpu.uniform_location(program, UNIFORM_TEXTURE),
            light_color: gpu.uniform_location(program, UNIFORM_LIGHT_COLOR),
            light_position: gpu.uniform_location(program, UNIFORM_LIGHT_POSITION),
            camera_position: gpu.uniform_location(program, UNIFORM_CAMERA_POSITION),
        }
    })
}
