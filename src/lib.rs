//! Building blocks for a small interactive mesh viewer.
//!
//! Geometry comes from built-in primitives or Wavefront OBJ files and is
//! registered once in a [`SceneRegistry`], which owns the GPU copies and
//! draws named object instances that reference them. The GPU itself sits
//! behind the [`GpuBackend`] trait so everything above it can run headless.

pub mod camera;
pub mod config;
pub mod gpu;
pub mod input;
pub mod mesh;
pub mod obj;
pub mod picking;
pub mod registry;
pub mod render;
pub mod scene;
pub mod shapes;
pub mod viewer;

pub use camera::Camera;
pub use config::{CliOptions, ViewerConfig};
pub use gpu::{GpuBackend, PixelFormat, ProgramId, ShaderProgramRef, UniformLocation, UniformValue};
pub use input::{CursorMode, CursorRequest, InputSource, InputState, KeyCode, MouseButton, NamedKey};
pub use mesh::{CpuMeshData, MeshError, Vertex};
pub use obj::{load_obj, parse_obj, try_load_obj, ObjError};
pub use picking::{is_object_hit, screen_to_ray, Aabb, PressEdge, Ray};
pub use registry::{RegistryError, RenderStats, SceneRegistry};
pub use render::{CameraParams, FrameContext, HeadlessBackend, LightParams, WgpuBackend};
pub use scene::{Motion, PopulateSummary, SceneDescription, SceneObject};
pub use shapes::ShapeType;
pub use viewer::ViewerState;
