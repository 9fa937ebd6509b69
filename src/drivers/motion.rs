// L3G4200D gyroscope and the tilt estimate behind the level overlay
//
// There is no accelerometer, so tilt is integrated from the Y rate
// and decays toward zero whenever the body is still. Good enough to
// show a horizon line; not an attitude reference.

use std::collections::VecDeque;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::HwError;

const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_CTRL_REG4: u8 = 0x23;
const REG_OUT_X_L: u8 = 0x28;
const AUTO_INCREMENT: u8 = 0x80;
const WHO_AM_I_VALUE: u8 = 0xD3;

// 250 dps full scale
const DPS_PER_DIGIT: f32 = 8.75 / 1000.0;

const STILL_DPS: f32 = 5.0;
const MOVING_DPS: f32 = 10.0;
const TILT_DECAY: f32 = 0.98;
const TILT_LIMIT: f32 = 90.0;
const SMOOTHING: usize = 10;

pub trait Gyro: Send {
    /// Bias-compensated rates in degrees per second, (x, y, z).
    fn read_rates(&mut self) -> Result<[f32; 3], HwError>;
}

pub struct L3g4200d<I2C> {
    i2c: I2C,
    addr: u8,
    bias: [f32; 3],
}

impl<I2C: I2c> L3g4200d<I2C> {
    pub fn new(mut i2c: I2C, addr: u8) -> Result<Self, HwError> {
        let mut id = [0u8; 1];
        i2c.write_read(addr, &[REG_WHO_AM_I], &mut id)
            .map_err(HwError::i2c)?;
        if id[0] != WHO_AM_I_VALUE {
            return Err(HwError::I2c(format!(
                "gyro WHO_AM_I 0x{:02X}, expected 0x{:02X}",
                id[0], WHO_AM_I_VALUE
            )));
        }
        // 100 Hz ODR, normal mode, XYZ enabled; 250 dps
        i2c.write(addr, &[REG_CTRL_REG1, 0x0F]).map_err(HwError::i2c)?;
        i2c.write(addr, &[REG_CTRL_REG4, 0x00]).map_err(HwError::i2c)?;

        Ok(Self {
            i2c,
            addr,
            bias: [0.0; 3],
        })
    }

    /// Averages `samples` readings as the zero-rate bias. Hold still.
    pub fn calibrate(&mut self, samples: u32, gap: Duration) -> Result<(), HwError> {
        let mut sum = [0.0f32; 3];
        for _ in 0..samples {
            let r = self.read_raw()?;
            for (s, v) in sum.iter_mut().zip(r) {
                *s += v;
            }
            std::thread::sleep(gap);
        }
        let n = samples.max(1) as f32;
        self.bias = sum.map(|s| s / n);
        log::info!(
            "motion: gyro bias ({:.2}, {:.2}, {:.2}) dps",
            self.bias[0],
            self.bias[1],
            self.bias[2]
        );
        Ok(())
    }

    pub fn read_rates(&mut self) -> Result<[f32; 3], HwError> {
        let raw = self.read_raw()?;
        Ok([raw[0] - self.bias[0], raw[1] - self.bias[1], raw[2] - self.bias[2]])
    }

    fn read_raw(&mut self) -> Result<[f32; 3], HwError> {
        let mut buf = [0u8; 6];
        self.i2c
            .write_read(self.addr, &[AUTO_INCREMENT | REG_OUT_X_L], &mut buf)
            .map_err(HwError::i2c)?;
        let axis = |lo: u8, hi: u8| i16::from_le_bytes([lo, hi]) as f32 * DPS_PER_DIGIT;
        Ok([axis(buf[0], buf[1]), axis(buf[2], buf[3]), axis(buf[4], buf[5])])
    }
}

impl<I2C: I2c + Send> Gyro for L3g4200d<I2C> {
    fn read_rates(&mut self) -> Result<[f32; 3], HwError> {
        L3g4200d::read_rates(self)
    }
}

/// Integrates gyro rates into a smoothed tilt angle.
#[derive(Debug, Clone)]
pub struct TiltEstimator {
    tilt: f32,
    history: VecDeque<f32>,
}

impl Default for TiltEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TiltEstimator {
    pub fn new() -> Self {
        Self {
            tilt: 0.0,
            history: VecDeque::with_capacity(SMOOTHING),
        }
    }

    /// Feeds one sample taken `dt` after the previous one; returns the
    /// smoothed tilt in degrees, within ±90.
    pub fn update(&mut self, rates: [f32; 3], dt: Duration) -> f32 {
        let still = rates.iter().all(|r| r.abs() < STILL_DPS);
        if still {
            self.tilt *= TILT_DECAY;
        } else {
            self.tilt = (self.tilt + rates[1] * dt.as_secs_f32()).clamp(-TILT_LIMIT, TILT_LIMIT);
        }

        if self.history.len() == SMOOTHING {
            self.history.pop_front();
        }
        self.history.push_back(self.tilt);
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }
}

pub fn is_moving(rates: [f32; 3]) -> bool {
    rates.iter().any(|r| r.abs() > MOVING_DPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::haptic::fake::FakeI2c;

    #[test]
    fn new_checks_identity() {
        let bus = FakeI2c::default();
        bus.set_reg(0x69, REG_WHO_AM_I, &[0x42]);
        assert!(L3g4200d::new(bus.clone(), 0x69).is_err());

        bus.set_reg(0x69, REG_WHO_AM_I, &[WHO_AM_I_VALUE]);
        assert!(L3g4200d::new(bus, 0x69).is_ok());
    }

    #[test]
    fn rates_are_scaled_and_signed() {
        let bus = FakeI2c::default();
        bus.set_reg(0x69, REG_WHO_AM_I, &[WHO_AM_I_VALUE]);
        // x = 1000 digits, y = -1000 digits, z = 0
        let x = 1000i16.to_le_bytes();
        let y = (-1000i16).to_le_bytes();
        bus.set_reg(0x69, AUTO_INCREMENT | REG_OUT_X_L, &[x[0], x[1], y[0], y[1], 0, 0]);

        let mut g = L3g4200d::new(bus, 0x69).unwrap();
        let r = g.read_rates().unwrap();
        assert!((r[0] - 8.75).abs() < 1e-4);
        assert!((r[1] + 8.75).abs() < 1e-4);
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn tilt_integrates_and_decays() {
        let mut t = TiltEstimator::new();
        let dt = Duration::from_millis(50);
        for _ in 0..10 {
            t.update([0.0, 40.0, 0.0], dt);
        }
        // 10 samples x 2 degrees, smoothed over the ramp
        let moving = t.update([0.0, 40.0, 0.0], dt);
        assert!(moving > 10.0 && moving <= 22.0, "{}", moving);

        let mut still = moving;
        for _ in 0..200 {
            still = t.update([0.5, 0.5, 0.5], dt);
        }
        assert!(still.abs() < 1.0, "{}", still);
    }

    #[test]
    fn tilt_is_clamped() {
        let mut t = TiltEstimator::new();
        let mut last = 0.0;
        for _ in 0..100 {
            last = t.update([0.0, 500.0, 0.0], Duration::from_millis(100));
        }
        assert!(last <= 90.0);
    }

    #[test]
    fn motion_threshold() {
        assert!(is_moving([0.0, -12.0, 0.0]));
        assert!(!is_moving([9.0, 9.0, -9.0]));
    }
}
