use std::collections::HashSet;

use glam::Vec2;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

/// Friendly names for the non-character keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Cursor visibility requested by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorMode {
    #[default]
    Normal,
    Hidden,
}

/// Cursor change the windowing layer has to apply to the real window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorRequest {
    Warp(Vec2),
    Mode(CursorMode),
}

/// Key/button state and cursor control, as seen by the camera and the picker.
pub trait InputSource {
    fn is_key_down(&self, key: KeyCode) -> bool;
    fn is_mouse_button_down(&self, button: MouseButton) -> bool;
    fn cursor_position(&self) -> Vec2;
    fn set_cursor_position(&self, position: Vec2);
    fn set_cursor_mode(&self, mode: CursorMode);
}

/// Input snapshot fed by the window event handler.
///
/// Cursor writes are applied to the snapshot immediately and queued so the
/// windowing layer can mirror them on the OS cursor.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    mouse_position: RwLock<Vec2>,
    cursor_mode: RwLock<CursorMode>,
    requests: Mutex<Vec<CursorRequest>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    /// Records a cursor move reported by the OS.
    pub fn set_mouse_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse_position.read()
    }

    pub fn cursor_mode(&self) -> CursorMode {
        *self.cursor_mode.read()
    }

    /// Drains the cursor changes issued since the last call.
    pub fn take_cursor_requests(&self) -> Vec<CursorRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    /// Forgets every held key and button, e.g. when the window loses focus.
    pub fn release_all(&self) {
        self.keys.write().clear();
        self.mouse_buttons.write().clear();
    }
}

impl InputSource for InputState {
    fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    fn cursor_position(&self) -> Vec2 {
        self.mouse_position()
    }

    fn set_cursor_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
        self.requests.lock().push(CursorRequest::Warp(position));
    }

    fn set_cursor_mode(&self, mode: CursorMode) {
        let mut current = self.cursor_mode.write();
        if *current != mode {
            *current = mode;
            self.requests.lock().push(CursorRequest::Mode(mode));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_state_tracks_keys_and_buttons() {
        let state = InputState::new();
        let shift = KeyCode::Named(NamedKey::LeftShift);
        state.set_key_down(shift);
        state.set_key_down(KeyCode::Character('W'));
        state.set_key_up(KeyCode::Character('W'));
        assert!(state.is_key_down(shift));
        assert!(!state.is_key_down(KeyCode::Character('W')));
        state.set_mouse_button_down(MouseButton::RIGHT);
        assert!(state.is_mouse_button_down(MouseButton::RIGHT));
        assert!(!state.is_mouse_button_down(MouseButton::LEFT));
        state.release_all();
        assert!(!state.is_key_down(shift));
        assert!(!state.is_mouse_button_down(MouseButton::RIGHT));
    }

    #[test]
    fn cursor_writes_update_snapshot_and_queue_requests() {
        let state = InputState::new();
        state.set_cursor_mode(CursorMode::Hidden);
        state.set_cursor_mode(CursorMode::Hidden);
        state.set_cursor_position(Vec2::new(400.0, 300.0));
        assert_eq!(state.cursor_position(), Vec2::new(400.0, 300.0));
        assert_eq!(
            state.take_cursor_requests(),
            vec![
                CursorRequest::Mode(CursorMode::Hidden),
                CursorRequest::Warp(Vec2::new(400.0, 300.0)),
            ]
        );
        assert!(state.take_cursor_requests().is_empty());
    }
}
