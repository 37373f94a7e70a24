//! Mouse and keyboard handling with press-edge detection

use crate::rendering::BoardLayout;
use crate::session::Intent;
use macroquad::prelude::*;

/// What the player did this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub intent: Option<Intent>,
    pub quit: bool,
}

/// Turns raw device state into board intents
pub struct InputManager {
    // Previous frame button states for edge detection
    prev_left: bool,
    prev_right: bool,
    prev_escape: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_left: false,
            prev_right: false,
            prev_escape: false,
        }
    }

    /// Samples devices once. `layout` is `None` while there is no board.
    pub fn update(&mut self, layout: Option<&BoardLayout>) -> FrameInput {
        let left = is_mouse_button_down(MouseButton::Left);
        let right = is_mouse_button_down(MouseButton::Right);
        let escape = is_key_down(KeyCode::Escape);
        let (mouse_x, mouse_y) = mouse_position();

        let left_pressed = pressed(&mut self.prev_left, left);
        let right_pressed = pressed(&mut self.prev_right, right);
        let quit = pressed(&mut self.prev_escape, escape);

        let cell = layout.and_then(|layout| layout.cell_at(mouse_x, mouse_y));

        FrameInput {
            intent: intent_for(left_pressed, right_pressed, cell),
            quit,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// True on the frame a button goes down.
fn pressed(previous: &mut bool, now: bool) -> bool {
    let edge = now && !*previous;
    *previous = now;
    edge
}

/// Left click reveals, right click toggles a flag. A frame with both
/// presses does nothing.
fn intent_for(left: bool, right: bool, cell: Option<(u32, u32)>) -> Option<Intent> {
    let (x, y) = cell?;
    match (left, right) {
        (true, false) => Some(Intent::Reveal { x, y }),
        (false, true) => Some(Intent::ToggleFlag { x, y }),
        _ => None,
    }
}
