// BH1750 ambient light sensor, continuous high-res mode (1 lux)
// Feeds auto brightness and the auto flash decision.

use std::collections::VecDeque;

use embedded_hal::i2c::I2c;

use crate::drivers::HwError;

const POWER_ON: u8 = 0x01;
const CONTINUOUS_HIGH_RES: u8 = 0x10;
const COUNTS_PER_LUX: f32 = 1.2;
const AVERAGE_OVER: usize = 5;

pub trait LightMeter: Send {
    fn read_lux(&mut self) -> Result<f32, HwError>;
}

pub struct Bh1750<I2C> {
    i2c: I2C,
    addr: u8,
    recent: VecDeque<f32>,
}

impl<I2C: I2c> Bh1750<I2C> {
    pub fn new(mut i2c: I2C, addr: u8) -> Result<Self, HwError> {
        i2c.write(addr, &[POWER_ON]).map_err(HwError::i2c)?;
        i2c.write(addr, &[CONTINUOUS_HIGH_RES]).map_err(HwError::i2c)?;
        Ok(Self {
            i2c,
            addr,
            recent: VecDeque::with_capacity(AVERAGE_OVER),
        })
    }

    fn read_raw(&mut self) -> Result<f32, HwError> {
        let mut buf = [0u8; 2];
        self.i2c.read(self.addr, &mut buf).map_err(HwError::i2c)?;
        Ok(u16::from_be_bytes(buf) as f32 / COUNTS_PER_LUX)
    }
}

impl<I2C: I2c + Send> LightMeter for Bh1750<I2C> {
    /// Moving average over the last few readings.
    fn read_lux(&mut self) -> Result<f32, HwError> {
        let lux = self.read_raw()?;
        if self.recent.len() == AVERAGE_OVER {
            self.recent.pop_front();
        }
        self.recent.push_back(lux);
        Ok(self.recent.iter().sum::<f32>() / self.recent.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::haptic::fake::FakeI2c;
    use embedded_hal::i2c::{ErrorType, Operation, SevenBitAddress};

    // plain reads carry no register byte, so serve a fixed value
    #[derive(Clone)]
    struct Counts(u16);

    impl ErrorType for Counts {
        type Error = embedded_hal::i2c::ErrorKind;
    }

    impl I2c for Counts {
        fn transaction(
            &mut self,
            _address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                if let Operation::Read(buf) = op {
                    buf.copy_from_slice(&self.0.to_be_bytes());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_powers_on_in_continuous_mode() {
        let bus = FakeI2c::default();
        Bh1750::new(bus.clone(), 0x23).unwrap();
        let w = bus.writes.borrow();
        assert_eq!(w[0], (0x23, vec![POWER_ON]));
        assert_eq!(w[1], (0x23, vec![CONTINUOUS_HIGH_RES]));
    }

    #[test]
    fn counts_convert_to_lux() {
        let mut s = Bh1750::new(Counts(120), 0x23).unwrap();
        assert!((s.read_lux().unwrap() - 100.0).abs() < 1e-3);
    }
}
