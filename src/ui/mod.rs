// Widget toolkit for the Rgb565 portrait canvas.
// Region-based layout, text labels, touch hitboxes, gesture
// recognition and the viewfinder overlays.

pub mod gesture;
pub mod hitbox;
mod label;
pub mod overlay;
mod widget;

pub use gesture::{Gesture, GestureDetector};
pub use hitbox::{Hit, Hitbox, HitboxEngine, HitboxError};
pub use label::Label;
pub use widget::{Alignment, Region, wrap_next, wrap_prev, wrap_step};

use embedded_graphics::mono_font::{MonoFont, ascii};
use embedded_graphics::pixelcolor::Rgb565;

pub const HEADING_FONT: &MonoFont<'static> = &ascii::FONT_10X20;
pub const BODY_FONT: &MonoFont<'static> = &ascii::FONT_9X18;
pub const SMALL_FONT: &MonoFont<'static> = &ascii::FONT_6X10;

pub const BAR_HEIGHT: u16 = 32;

// palette
pub const ACCENT: Rgb565 = Rgb565::new(31, 40, 0); // amber
pub const DIM: Rgb565 = Rgb565::new(8, 16, 8);
pub const PANEL: Rgb565 = Rgb565::new(3, 6, 3);
