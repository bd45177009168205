//! Built-in shader programs and the uniform slots they can declare.

use crate::gpu::{
    UniformLocation, UNIFORM_CAMERA_MATRIX, UNIFORM_CAMERA_POSITION, UNIFORM_LIGHT_COLOR,
    UNIFORM_LIGHT_POSITION, UNIFORM_MODEL, UNIFORM_TEXTURE,
};

/// Every uniform a program may expose. A location is the index into this table.
pub const UNIFORM_SLOTS: [&str; 6] = [
    UNIFORM_CAMERA_MATRIX,
    UNIFORM_MODEL,
    UNIFORM_TEXTURE,
    UNIFORM_LIGHT_COLOR,
    UNIFORM_LIGHT_POSITION,
    UNIFORM_CAMERA_POSITION,
];

pub fn slot_of(name: &str) -> Option<UniformLocation> {
    UNIFORM_SLOTS
        .iter()
        .position(|slot| *slot == name)
        .map(|index| UniformLocation(index as u32))
}

/// Source and interface of a program the caller links at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSpec {
    pub name: &'static str,
    pub source: &'static str,
    /// Uniforms the program reads; lookups of anything else report "not found".
    pub uniforms: &'static [&'static str],
}

impl ProgramSpec {
    pub fn declares(&self, name: &str) -> bool {
        self.uniforms.contains(&name)
    }

    pub fn samples_texture(&self) -> bool {
        self.declares(UNIFORM_TEXTURE)
    }
}

/// Textured, vertex-coloured, diffuse + specular lighting.
pub const DEFAULT_PROGRAM: ProgramSpec = ProgramSpec {
    name: "default",
    source: DEFAULT_SHADER,
    uniforms: &[
        UNIFORM_CAMERA_MATRIX,
        UNIFORM_MODEL,
        UNIFORM_TEXTURE,
        UNIFORM_LIGHT_COLOR,
        UNIFORM_LIGHT_POSITION,
        UNIFORM_CAMERA_POSITION,
    ],
};

/// Flat light colour, used for the lamp marker.
pub const OBJECT_PROGRAM: ProgramSpec = ProgramSpec {
    name: "object",
    source: OBJECT_SHADER,
    uniforms: &[UNIFORM_CAMERA_MATRIX, UNIFORM_MODEL, UNIFORM_LIGHT_COLOR],
};

pub const BUILTIN_PROGRAMS: [ProgramSpec; 2] = [DEFAULT_PROGRAM, OBJECT_PROGRAM];

const DEFAULT_SHADER: &str = r#"
struct DrawUniforms {
    cam_matrix: mat4x4<f32>,
    model: mat4x4<f32>,
    light_color: vec4<f32>,
    light_pos: vec4<f32>,
    cam_pos: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> u: DrawUniforms;

@group(1) @binding(0)
var tex0: texture_2d<f32>;
@group(1) @binding(1)
var tex0_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = u.model * vec4<f32>(input.position, 1.0);
    out.clip = u.cam_matrix * world;
    out.world_pos = world.xyz;
    out.color = input.color;
    out.uv = input.uv;
    out.normal = (u.model * vec4<f32>(input.normal, 0.0)).xyz;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let light_dir = normalize(u.light_pos.xyz - input.world_pos);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let ambient = 0.2;

    let view_dir = normalize(u.cam_pos.xyz - input.world_pos);
    let reflected = reflect(-light_dir, normal);
    let specular = 0.5 * pow(max(dot(view_dir, reflected), 0.0), 16.0);

    let base = textureSample(tex0, tex0_sampler, input.uv) * vec4<f32>(input.color, 1.0);
    return base * u.light_color * (diffuse + ambient + specular);
}
"#;

const OBJECT_SHADER: &str = r#"
struct DrawUniforms {
    cam_matrix: mat4x4<f32>,
    model: mat4x4<f32>,
    light_color: vec4<f32>,
    light_pos: vec4<f32>,
    cam_pos: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> u: DrawUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.cam_matrix * u.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.light_color;
}
"#;
