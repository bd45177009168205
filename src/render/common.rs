use glam::{Mat4, Vec3, Vec4};

/// Camera state consumed by the render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

/// Single global light shared by every shaded object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightParams {
    pub color: Vec4,
    pub position: Vec3,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            position: Vec3::splat(0.5),
        }
    }
}

/// Everything one render pass reads besides the registry itself.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FrameContext {
    /// Seconds since start; animation is a pure function of this value.
    pub time: f32,
    pub camera: CameraParams,
    pub light: LightParams,
}
