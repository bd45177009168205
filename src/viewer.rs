//! Per-frame composition of camera, light buttons and lamp.

use std::fmt::Write as _;

use glam::{Vec3, Vec4};

use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::gpu::GpuBackend;
use crate::input::{InputSource, MouseButton};
use crate::picking::{is_object_hit, screen_to_ray, PressEdge};
use crate::registry::SceneRegistry;
use crate::render::{FrameContext, LightParams};
use crate::scene::{BUTTON_LEFT, BUTTON_RIGHT, LAMP_OBJECT};

const UI_DISTANCE: f32 = 1.0;
const UI_SIDE: f32 = 0.2;
const UI_DOWN: f32 = -0.2;
const LIGHT_STEP: f32 = 1.0;
const LIGHT_LIMIT: f32 = 5.0;
const PICK_BUTTON: MouseButton = MouseButton::RIGHT;

pub const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 2.0);

/// Adds `step`, wrapping to the opposite bound once `limit` is exceeded.
pub fn wrap_step(value: f32, step: f32, limit: f32) -> f32 {
    let value = value + step;
    if value > limit {
        -limit
    } else if value < -limit {
        limit
    } else {
        value
    }
}

/// Keeps the two light buttons floating just below and in front of the camera.
pub fn update_ui_buttons<B: GpuBackend>(registry: &mut SceneRegistry<B>, camera: &Camera) {
    let (forward, right, up) = camera.basis();
    let anchor = camera.position + forward * UI_DISTANCE + up * UI_DOWN;
    registry.set_object_position(BUTTON_LEFT, anchor - right * UI_SIDE);
    registry.set_object_position(BUTTON_RIGHT, anchor + right * UI_SIDE);
}

pub struct ViewerState {
    pub camera: Camera,
    pub config: ViewerConfig,
    light_color: Vec4,
    light_position: Vec3,
    pick_edge: PressEdge,
}

impl ViewerState {
    pub fn new(config: ViewerConfig, light: LightParams) -> Self {
        Self {
            camera: Camera::new(config.width, config.height, CAMERA_START),
            config,
            light_color: light.color,
            light_position: light.position,
            pick_edge: PressEdge::default(),
        }
    }

    pub fn light(&self) -> LightParams {
        LightParams {
            color: self.light_color,
            position: self.light_position,
        }
    }

    /// Runs one frame of interaction and returns the context to render it with.
    ///
    /// A right click on a light button moves the light one unit along X,
    /// wrapping at +/-5; the lamp object follows the light.
    pub fn step<B: GpuBackend>(
        &mut self,
        registry: &mut SceneRegistry<B>,
        input: &dyn InputSource,
        time: f32,
    ) -> FrameContext {
        self.camera.update(input);
        update_ui_buttons(registry, &self.camera);

        if self
            .pick_edge
            .consume(input.is_mouse_button_down(PICK_BUTTON))
        {
            let ray = screen_to_ray(
                input.cursor_position(),
                self.camera.viewport(),
                &self.camera,
                self.config.fov_deg,
                self.config.near,
                self.config.far,
            );
            if is_object_hit(registry, BUTTON_LEFT, &ray) {
                self.light_position.x = wrap_step(self.light_position.x, -LIGHT_STEP, LIGHT_LIMIT);
            }
            if is_object_hit(registry, BUTTON_RIGHT, &ray) {
                self.light_position.x = wrap_step(self.light_position.x, LIGHT_STEP, LIGHT_LIMIT);
            }
        }

        registry.set_light_params(self.light_color, self.light_position);
        registry.set_object_position(LAMP_OBJECT, self.light_position);

        let camera = self
            .camera
            .params(self.config.fov_deg, self.config.near, self.config.far);
        registry.frame(time, camera)
    }
}

/// One line per object with its animated world position at `time`.
pub fn describe_objects<B: GpuBackend>(registry: &SceneRegistry<B>, time: f32) -> String {
    let mut report = String::from("Final object positions:\n");
    for object in registry.objects() {
        let p = SceneRegistry::<B>::world_position(object, time);
        let _ = writeln!(
            report,
            " - {} pos=({:.2}, {:.2}, {:.2})",
            object.name, p.x, p.y, p.z
        );
    }
    report
}
