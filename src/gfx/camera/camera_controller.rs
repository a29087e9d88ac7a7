use winit::{
    event::{DeviceEvent, ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::fly_camera::{FlyCamera, Movement};

/// Camera input gathered since the last update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Mouse motion in pixels while the left button was held
    pub drag: (f32, f32),
}

impl CameraInput {
    /// Moves and rotates `camera` for a frame lasting `dt` seconds
    pub fn apply(&self, camera: &mut FlyCamera, dt: f32) {
        let moves = [
            (self.forward, Movement::Forward),
            (self.backward, Movement::Backward),
            (self.left, Movement::Left),
            (self.right, Movement::Right),
        ];
        for (held, movement) in moves {
            if held {
                camera.process_movement(movement, dt);
            }
        }

        if self.drag != (0.0, 0.0) {
            // Screen y grows downwards
            camera.process_mouse(self.drag.0, -self.drag.1);
        }
    }
}

/// Turns winit keyboard and mouse events into [`CameraInput`]
#[derive(Debug, Default)]
pub struct CameraController {
    input: CameraInput,
    is_mouse_pressed: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_events(&mut self, event: &DeviceEvent) {
        match event {
            DeviceEvent::Button {
                button: 0, // Left Mouse Button
                state,
            } => {
                self.is_mouse_pressed = *state == ElementState::Pressed;
            }
            DeviceEvent::MouseMotion { delta } => {
                if self.is_mouse_pressed {
                    self.input.drag.0 += delta.0 as f32;
                    self.input.drag.1 += delta.1 as f32;
                }
            }
            _ => (),
        }
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;

        match code {
            KeyCode::KeyW => self.input.forward = pressed,
            KeyCode::KeyS => self.input.backward = pressed,
            KeyCode::KeyA => self.input.left = pressed,
            KeyCode::KeyD => self.input.right = pressed,
            _ => (),
        }
    }

    /// Releases held keys and the drag, e.g. when the window loses focus
    pub fn reset(&mut self) {
        self.input = CameraInput::default();
        self.is_mouse_pressed = false;
    }

    /// Returns the input for this frame and clears the accumulated drag
    pub fn take_input(&mut self) -> CameraInput {
        let input = self.input;
        self.input.drag = (0.0, 0.0);
        input
    }

    pub fn is_dragging(&self) -> bool {
        self.is_mouse_pressed
    }
}
