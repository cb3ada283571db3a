//! Keyboard and pointer input
//!
//! Key presses become [`Command`]s for the app; pointer motion is tracked so
//! the overlay can show the value under the cursor.

use crate::display::InputEvent;
use sdl2::keyboard::Keycode;

/// Everything the operator can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleHelp,
    Rotate,
    NextPalette,
    NextInterpolation,
    ZoomIn,
    ZoomOut,
    Snapshot,
    ToggleRecording,
    ToggleGradient,
}

impl Command {
    /// Letter keys arrive as lowercase keycodes regardless of shift
    pub fn from_keycode(key: Keycode) -> Option<Self> {
        match key {
            Keycode::Q | Keycode::Escape => Some(Command::Quit),
            Keycode::H => Some(Command::ToggleHelp),
            Keycode::R => Some(Command::Rotate),
            Keycode::P => Some(Command::NextPalette),
            Keycode::I => Some(Command::NextInterpolation),
            Keycode::Plus | Keycode::Equals | Keycode::KpPlus => Some(Command::ZoomIn),
            Keycode::Minus | Keycode::Underscore | Keycode::KpMinus => Some(Command::ZoomOut),
            Keycode::S => Some(Command::Snapshot),
            Keycode::V => Some(Command::ToggleRecording),
            Keycode::G => Some(Command::ToggleGradient),
            _ => None,
        }
    }

    /// Key label and description, in help-screen order
    pub const HELP: [(&'static str, &'static str); 10] = [
        ("H", "Toggle this help"),
        ("R", "Rotate 90 degrees"),
        ("P", "Next color palette"),
        ("I", "Next interpolation"),
        ("+", "Zoom in"),
        ("-", "Zoom out"),
        ("S", "Save snapshot"),
        ("V", "Start/stop recording"),
        ("G", "Toggle gradient legend"),
        ("Q", "Quit"),
    ];
}

/// Last known pointer position in window coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pointer: Option<(i32, i32)>,
}

impl InputState {
    pub fn pointer(&self) -> Option<(i32, i32)> {
        self.pointer
    }

    /// Fold one event into the state, returning the command it carries
    pub fn handle(&mut self, event: &InputEvent) -> Option<Command> {
        match event {
            InputEvent::Quit => Some(Command::Quit),
            InputEvent::KeyDown(key) => Command::from_keycode(*key),
            InputEvent::MouseMove { x, y } => {
                self.pointer = Some((*x, *y));
                None
            },
            InputEvent::MouseLeave => {
                self.pointer = None;
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_aliases() {
        assert_eq!(Command::from_keycode(Keycode::Escape), Some(Command::Quit));
        assert_eq!(Command::from_keycode(Keycode::Q), Some(Command::Quit));
        for key in [Keycode::Plus, Keycode::Equals, Keycode::KpPlus] {
            assert_eq!(Command::from_keycode(key), Some(Command::ZoomIn));
        }
        for key in [Keycode::Minus, Keycode::Underscore, Keycode::KpMinus] {
            assert_eq!(Command::from_keycode(key), Some(Command::ZoomOut));
        }
        assert_eq!(Command::from_keycode(Keycode::V), Some(Command::ToggleRecording));
        assert_eq!(Command::from_keycode(Keycode::Z), None);
    }

    #[test]
    fn test_window_close_quits() {
        let mut input = InputState::default();
        assert_eq!(input.handle(&InputEvent::Quit), Some(Command::Quit));
    }

    #[test]
    fn test_pointer_tracking() {
        let mut input = InputState::default();
        assert_eq!(input.pointer(), None);
        assert_eq!(input.handle(&InputEvent::MouseMove { x: 3, y: 4 }), None);
        assert_eq!(input.pointer(), Some((3, 4)));
        input.handle(&InputEvent::MouseLeave);
        assert_eq!(input.pointer(), None);
    }
}
