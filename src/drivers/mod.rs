// Hardware drivers and their desktop stand-ins.
//
// Each collaborator sits behind a small trait (Backlight, Haptic, Flash,
// CameraBackend, ShutdownInvoker, EventSource) so the app core never
// knows whether it is talking to sysfs, I2C or a simulator. Chip
// drivers are generic over embedded-hal so they run against
// linux-embedded-hal on the Pi and against fakes in tests.

pub mod backlight;
pub mod battery;
pub mod camera;
pub mod encoder;
pub mod flash;
pub mod haptic;
pub mod input;
pub mod light;
pub mod motion;
pub mod script;
pub mod sensor;
pub mod shutdown;
pub mod storage;

#[cfg(target_os = "linux")]
pub mod evdev;
#[cfg(target_os = "linux")]
pub mod framebuffer;

use std::io;
use std::time::Instant;

use crate::board::InputEvent;

/// Errors at the hardware boundary. All of them are transient from the
/// app's point of view: logged, the operation skipped.
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("i2c: {0}")]
    I2c(String),
    #[error("gpio: {0}")]
    Gpio(String),
    #[error("display: {0}")]
    Display(String),
    #[error("camera: {0}")]
    Camera(String),
    #[error("{0} not present")]
    Absent(&'static str),
}

impl HwError {
    pub(crate) fn i2c<E: embedded_hal::i2c::Error>(e: E) -> Self {
        HwError::I2c(format!("{:?}", e.kind()))
    }

    pub(crate) fn gpio<E: embedded_hal::digital::Error>(e: E) -> Self {
        HwError::Gpio(format!("{:?}", e.kind()))
    }
}

/// Anything that produces input events when polled.
pub trait EventSource {
    fn poll(&mut self, now: Instant, out: &mut Vec<InputEvent>);
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn poll(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        (**self).poll(now, out)
    }
}
