mod common;
pub mod headless;
pub mod programs;
pub mod wgpu_backend;

pub use common::{CameraParams, FrameContext, LightParams};
pub use headless::{DrawCall, HeadlessBackend};
pub use wgpu_backend::WgpuBackend;
