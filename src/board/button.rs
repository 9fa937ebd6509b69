//! Physical push buttons on the camera body
//!
//! Both are plain GPIO inputs, active low with pull-ups on the HAT.
//! The encoder push doubles as the power button (long press).

/// All physical buttons on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    EncoderPush,
    Shutter,
}

impl Button {
    pub const ALL: [Button; 2] = [Button::EncoderPush, Button::Shutter];

    pub const fn name(self) -> &'static str {
        match self {
            Button::EncoderPush => "Encoder",
            Button::Shutter => "Shutter",
        }
    }
}

impl core::fmt::Display for Button {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
