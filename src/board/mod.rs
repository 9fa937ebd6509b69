//! Raspberry Pi camera board map
//!
//! Maps physical hardware to named subsystems so the rest of the
//! crate never hardcodes GPIO line numbers, bus paths or chip
//! addresses. Everything Linux specific lives behind `PiBoard`.

pub mod action;
pub mod button;

pub use action::{Action, InputEvent, Key, UnknownAction};
pub use button::Button;

// GPIO lines (BCM numbering on gpiochip0)
pub const ENCODER_A_LINE: u32 = 5;
pub const ENCODER_B_LINE: u32 = 6;
pub const ENCODER_PUSH_LINE: u32 = 13;
pub const SHUTTER_LINE: u32 = 26;
pub const FLASH_LINE: u32 = 27;

pub const GPIO_CHIP: &str = "/dev/gpiochip0";
pub const I2C_BUS: &str = "/dev/i2c-1";
pub const FRAMEBUFFER_DEV: &str = "/dev/fb0";

// I2C peripherals
pub const HAPTIC_ADDR: u8 = 0x5A; // DRV2605L
pub const LIGHT_ADDR: u8 = 0x23; // BH1750
pub const GYRO_ADDR: u8 = 0x69; // L3G4200D
pub const FUEL_GAUGE_ADDR: u8 = 0x36; // MAX17043 on the UPS HAT

/// Backlight class directories, tried in order.
pub const BACKLIGHT_DIRS: &[&str] = &[
    "/sys/class/backlight/rpi_backlight",
    "/sys/class/backlight/10-0045",
    "/sys/class/backlight/backlight",
];

#[cfg(target_os = "linux")]
pub use pi::PiBoard;

#[cfg(target_os = "linux")]
mod pi {
    use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
    use linux_embedded_hal::{CdevPin, I2cdev};

    use super::*;
    use crate::drivers::HwError;

    /// Input lines of the camera body, requested once at startup.
    pub struct PiBoard {
        pub encoder_a: CdevPin,
        pub encoder_b: CdevPin,
        pub encoder_push: CdevPin,
        pub shutter: CdevPin,
    }

    impl PiBoard {
        pub fn open() -> Result<Self, HwError> {
            let mut chip = Chip::new(GPIO_CHIP).map_err(|e| HwError::Gpio(e.to_string()))?;
            Ok(Self {
                encoder_a: input_line(&mut chip, ENCODER_A_LINE, "pocketcam-enc-a")?,
                encoder_b: input_line(&mut chip, ENCODER_B_LINE, "pocketcam-enc-b")?,
                encoder_push: input_line(&mut chip, ENCODER_PUSH_LINE, "pocketcam-push")?,
                shutter: input_line(&mut chip, SHUTTER_LINE, "pocketcam-shutter")?,
            })
        }

        /// The flash LED is optional; a body without one still boots.
        pub fn flash_pin() -> Result<CdevPin, HwError> {
            let mut chip = Chip::new(GPIO_CHIP).map_err(|e| HwError::Gpio(e.to_string()))?;
            request_line(&mut chip, FLASH_LINE, LineRequestFlags::OUTPUT, "pocketcam-flash")
        }

        /// Each I2C device gets its own handle; the kernel serialises access.
        pub fn open_i2c() -> Result<I2cdev, HwError> {
            I2cdev::new(I2C_BUS).map_err(|e| HwError::I2c(e.to_string()))
        }
    }

    fn input_line(chip: &mut Chip, line: u32, label: &str) -> Result<CdevPin, HwError> {
        request_line(chip, line, LineRequestFlags::INPUT, label)
    }

    fn request_line(
        chip: &mut Chip,
        line: u32,
        flags: LineRequestFlags,
        label: &str,
    ) -> Result<CdevPin, HwError> {
        let handle = chip
            .get_line(line)
            .and_then(|l| l.request(flags, 0, label))
            .map_err(|e| HwError::Gpio(format!("line {}: {}", line, e)))?;
        CdevPin::new(handle).map_err(|e| HwError::Gpio(format!("line {}: {:?}", line, e)))
    }
}
