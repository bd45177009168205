use glam::{Mat4, Quat, Vec2, Vec3};

use crate::input::{CursorMode, InputSource, KeyCode, MouseButton, NamedKey};
use crate::render::CameraParams;

const MOVE_DIVISOR: f32 = 5.0;
const SPEED_NORMAL: f32 = 0.1;
const SPEED_BOOST: f32 = 0.2;
const MAX_PITCH_DEG: f32 = 85.0;
const DEFAULT_SENSITIVITY: f32 = 100.0;

const KEY_FORWARD: KeyCode = KeyCode::Character('W');
const KEY_BACK: KeyCode = KeyCode::Character('S');
const KEY_LEFT: KeyCode = KeyCode::Character('A');
const KEY_RIGHT: KeyCode = KeyCode::Character('D');
const KEY_UP: KeyCode = KeyCode::Named(NamedKey::Space);
const KEY_DOWN: KeyCode = KeyCode::Named(NamedKey::LeftCtrl);
const KEY_BOOST: KeyCode = KeyCode::Named(NamedKey::LeftShift);
const LOOK_BUTTON: MouseButton = MouseButton::LEFT;

/// Free-flying camera driven by WASD movement and click-and-drag mouse look.
///
/// Orientation is a unit forward vector; matrices are derived on every request.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Vec3,
    pub up: Vec3,
    pub sensitivity: f32,
    width: u32,
    height: u32,
    speed: f32,
    first_click: bool,
}

impl Camera {
    pub fn new(width: u32, height: u32, position: Vec3) -> Self {
        Self {
            position,
            orientation: Vec3::NEG_Z,
            up: Vec3::Y,
            sensitivity: DEFAULT_SENSITIVITY,
            width: width.max(1),
            height: height.max(1),
            speed: SPEED_NORMAL,
            first_click: true,
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Orthonormal (forward, right, up) frame used for movement.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = self.orientation.normalize();
        let right = forward.cross(self.up).normalize();
        (forward, right, self.up.normalize())
    }

    /// Applies one frame of keyboard movement and mouse look.
    pub fn update(&mut self, input: &dyn InputSource) {
        let (forward, right, up) = self.basis();
        let step = self.speed / MOVE_DIVISOR;

        if input.is_key_down(KEY_FORWARD) {
            self.position += step * forward;
        }
        if input.is_key_down(KEY_BACK) {
            self.position -= step * forward;
        }
        if input.is_key_down(KEY_LEFT) {
            self.position -= step * right;
        }
        if input.is_key_down(KEY_RIGHT) {
            self.position += step * right;
        }
        if input.is_key_down(KEY_UP) {
            self.position += step * up;
        }
        if input.is_key_down(KEY_DOWN) {
            self.position -= step * up;
        }

        self.speed = if input.is_key_down(KEY_BOOST) {
            SPEED_BOOST
        } else {
            SPEED_NORMAL
        };

        if !input.is_mouse_button_down(LOOK_BUTTON) {
            input.set_cursor_mode(CursorMode::Normal);
            self.first_click = true;
            return;
        }

        input.set_cursor_mode(CursorMode::Hidden);
        let center = Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5);
        if self.first_click {
            input.set_cursor_position(center);
            self.first_click = false;
        }

        let delta = input.cursor_position() - center;
        let rot_x = self.sensitivity * (delta.y / self.height as f32);
        let rot_y = self.sensitivity * (delta.x / self.width as f32);
        self.look(rot_x, rot_y);

        input.set_cursor_position(center);
    }

    /// Pitches by `-pitch_deg` (rejected as a whole past the pitch limit) and yaws by `-yaw_deg`.
    pub fn look(&mut self, pitch_deg: f32, yaw_deg: f32) {
        let pitch_axis = self.orientation.cross(self.up);
        if pitch_axis.length_squared() > f32::EPSILON {
            let pitched =
                Quat::from_axis_angle(pitch_axis.normalize(), (-pitch_deg).to_radians())
                    * self.orientation;
            let from_level = pitched.angle_between(self.up) - 90f32.to_radians();
            if from_level.abs() <= MAX_PITCH_DEG.to_radians() {
                self.orientation = pitched;
            }
        }
        let yaw = Quat::from_axis_angle(self.up.normalize(), (-yaw_deg).to_radians());
        self.orientation = (yaw * self.orientation).normalize();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.orientation, self.up)
    }

    pub fn projection_matrix(&self, fov_deg: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(fov_deg.to_radians(), self.aspect(), near, far)
    }

    /// Combined `projection * view`, recomputed on each call.
    pub fn matrix(&self, fov_deg: f32, near: f32, far: f32) -> Mat4 {
        self.projection_matrix(fov_deg, near, far) * self.view_matrix()
    }

    pub fn params(&self, fov_deg: f32, near: f32, far: f32) -> CameraParams {
        CameraParams {
            view_proj: self.matrix(fov_deg, near, far),
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputState;

    fn camera() -> Camera {
        Camera::new(800, 800, Vec3::new(0.0, 0.0, 2.0))
    }

    fn elevation_deg(orientation: Vec3) -> f32 {
        90.0 - orientation.angle_between(Vec3::Y).to_degrees()
    }

    #[test]
    fn forward_key_moves_along_orientation() {
        let mut camera = camera();
        let input = InputState::new();
        input.set_key_down(KEY_FORWARD);
        camera.update(&input);
        assert!((camera.position - Vec3::new(0.0, 0.0, 1.98)).length() < 1e-6);
    }

    #[test]
    fn boost_is_recomputed_every_update() {
        let mut camera = camera();
        let input = InputState::new();
        input.set_key_down(KEY_RIGHT);
        input.set_key_down(KEY_BOOST);
        camera.update(&input);
        assert!((camera.position.x - 0.02).abs() < 1e-6);
        camera.update(&input);
        assert!((camera.position.x - 0.06).abs() < 1e-6);
        input.set_key_up(KEY_BOOST);
        camera.update(&input);
        assert_eq!(camera.speed(), SPEED_NORMAL);
    }

    #[test]
    fn released_button_shows_cursor_and_arms_first_click() {
        let mut camera = camera();
        let input = InputState::new();
        input.set_mouse_button_down(LOOK_BUTTON);
        camera.update(&input);
        assert_eq!(input.cursor_mode(), CursorMode::Hidden);
        assert!(!camera.first_click);

        input.set_mouse_button_up(LOOK_BUTTON);
        camera.update(&input);
        assert_eq!(input.cursor_mode(), CursorMode::Normal);
        assert!(camera.first_click);
    }

    #[test]
    fn first_click_recenters_without_rotating() {
        let mut camera = camera();
        let input = InputState::new();
        input.set_mouse_position(Vec2::new(790.0, 10.0));
        input.set_mouse_button_down(LOOK_BUTTON);
        camera.update(&input);
        assert_eq!(camera.orientation, Vec3::NEG_Z);
        assert_eq!(input.cursor_position(), Vec2::new(400.0, 400.0));
    }

    #[test]
    fn horizontal_drag_yaws_toward_cursor() {
        let mut camera = camera();
        let input = InputState::new();
        input.set_mouse_button_down(LOOK_BUTTON);
        camera.update(&input);

        input.set_mouse_position(Vec2::new(480.0, 400.0));
        camera.update(&input);
        let expected = Vec3::new(10f32.to_radians().sin(), 0.0, -10f32.to_radians().cos());
        assert!((camera.orientation - expected).length() < 1e-5);
        assert_eq!(input.cursor_position(), Vec2::new(400.0, 400.0));
    }

    #[test]
    fn pitch_past_limit_is_rejected_but_yaw_applies() {
        let mut camera = camera();
        let elevation = 80f32.to_radians();
        camera.orientation = Vec3::new(0.0, elevation.sin(), -elevation.cos());

        // 10 degrees further up would leave the +/-85 degree band.
        camera.look(-10.0, 15.0);
        assert!((elevation_deg(camera.orientation) - 80.0).abs() < 1e-3);
        assert!(camera.orientation.x > 0.0);

        camera.look(-4.0, 0.0);
        assert!((elevation_deg(camera.orientation) - 84.0).abs() < 1e-3);
    }

    #[test]
    fn repeated_upward_drags_never_exceed_limit() {
        let mut camera = camera();
        for _ in 0..100 {
            camera.look(-7.0, 3.0);
            assert!(elevation_deg(camera.orientation) <= MAX_PITCH_DEG + 1e-3);
        }
        for _ in 0..100 {
            camera.look(7.0, -3.0);
            assert!(elevation_deg(camera.orientation) >= -MAX_PITCH_DEG - 1e-3);
        }
    }

    #[test]
    fn matrix_is_projection_times_view() {
        let camera = camera();
        let expected = camera.projection_matrix(45.0, 0.1, 50.0) * camera.view_matrix();
        assert_eq!(camera.matrix(45.0, 0.1, 50.0), expected);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-6);
    }
}
