// Input events and semantic UI actions.
//
// InputEvent is what the drivers produce: raw physical touch points,
// keys, encoder detents and button edges. Action is what a hitbox
// resolves to. Actions are parsed from their config names once, at
// load time; an unknown name fails the load instead of silently
// doing nothing at dispatch.

use core::fmt;
use core::str::FromStr;

use crate::board::button::Button;

/// Semantic UI actions bound to hitboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GoToSettings,
    GoToGallery,
    /// Back to the camera viewfinder
    GoToMain,
    CycleFlash,
    DeletePhoto,
    Capture,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::GoToSettings,
        Action::GoToGallery,
        Action::GoToMain,
        Action::CycleFlash,
        Action::DeletePhoto,
        Action::Capture,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Action::GoToSettings => "go_to_settings",
            Action::GoToGallery => "go_to_gallery",
            Action::GoToMain => "go_to_main",
            Action::CycleFlash => "cycle_flash",
            Action::DeletePhoto => "delete_photo",
            Action::Capture => "capture",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownAction(s.to_owned()))
    }
}

/// Keyboard keys the scenes understand (USB keyboard or evdev keypad).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Enter,
    Escape,
    Delete,
    Char(char),
}

/// Raw input as delivered by the drivers, in delivery order.
///
/// Touch coordinates are physical panel pixels; the app rotates them
/// into logical space exactly once before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    TouchDown { x: u16, y: u16 },
    TouchUp { x: u16, y: u16 },
    Key(Key),
    /// Signed encoder detents since the last event
    EncoderTurn(i8),
    ButtonDown(Button),
    ButtonUp(Button),
    /// Terminal close request (signal or window close), not a power-off
    Quit,
}

impl InputEvent {
    /// Events that count as "user did something" and wake from standby.
    pub fn is_wake_trigger(self) -> bool {
        matches!(
            self,
            InputEvent::TouchDown { .. }
                | InputEvent::Key(_)
                | InputEvent::EncoderTurn(_)
                | InputEvent::ButtonDown(_)
        )
    }
}
