// MAX17043 fuel gauge (single cell Li-ion)
//
// SOC is read directly; VCELL is kept as a fallback when the gauge
// has not converged yet. Linear approximation for the fallback:
// 4200mV = 100%, 3000mV = 0%.

use embedded_hal::i2c::I2c;

use crate::drivers::HwError;

const REG_VCELL: u8 = 0x02;
const REG_SOC: u8 = 0x04;

// VCELL is 12 bits in the top of the register, 1.25mV per LSB
const VCELL_UV_PER_LSB: u32 = 1250;

const VBAT_FULL_MV: u32 = 4200;
const VBAT_EMPTY_MV: u32 = 3000;

pub trait FuelGauge: Send {
    fn read_percent(&mut self) -> Result<u8, HwError>;
}

pub struct Max17043<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Max17043<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    fn read_reg(&mut self, reg: u8) -> Result<[u8; 2], HwError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(HwError::i2c)?;
        Ok(buf)
    }

    pub fn cell_mv(&mut self) -> Result<u16, HwError> {
        let raw = u16::from_be_bytes(self.read_reg(REG_VCELL)?) >> 4;
        Ok((raw as u32 * VCELL_UV_PER_LSB / 1000) as u16)
    }

    /// State of charge; whole percent in the high byte, 1/256ths below.
    pub fn soc(&mut self) -> Result<f32, HwError> {
        let [hi, lo] = self.read_reg(REG_SOC)?;
        Ok(hi as f32 + lo as f32 / 256.0)
    }

    pub fn percent(&mut self) -> Result<u8, HwError> {
        let soc = self.soc()?;
        if soc > 0.0 {
            return Ok(soc.round().clamp(0.0, 100.0) as u8);
        }
        Ok(battery_percentage(self.cell_mv()?))
    }
}

impl<I2C: I2c + Send> FuelGauge for Max17043<I2C> {
    fn read_percent(&mut self) -> Result<u8, HwError> {
        self.percent()
    }
}

pub fn battery_percentage(battery_mv: u16) -> u8 {
    let mv = battery_mv as u32;
    if mv >= VBAT_FULL_MV {
        100
    } else if mv <= VBAT_EMPTY_MV {
        0
    } else {
        ((mv - VBAT_EMPTY_MV) * 100 / (VBAT_FULL_MV - VBAT_EMPTY_MV)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::haptic::fake::FakeI2c;

    #[test]
    fn voltage_curve() {
        assert_eq!(battery_percentage(4300), 100);
        assert_eq!(battery_percentage(4200), 100);
        assert_eq!(battery_percentage(3600), 50);
        assert_eq!(battery_percentage(3000), 0);
        assert_eq!(battery_percentage(2500), 0);
    }

    #[test]
    fn soc_register_wins() {
        let bus = FakeI2c::default();
        bus.set_reg(0x36, REG_SOC, &[73, 200]);
        let mut g = Max17043::new(bus, 0x36);
        assert_eq!(g.percent().unwrap(), 74);
    }

    #[test]
    fn zero_soc_falls_back_to_voltage() {
        let bus = FakeI2c::default();
        // 3600mV = 2880 LSB, left-aligned by 4
        let raw = (2880u16 << 4).to_be_bytes();
        bus.set_reg(0x36, REG_VCELL, &raw);
        let mut g = Max17043::new(bus, 0x36);
        assert_eq!(g.cell_mv().unwrap(), 3600);
        assert_eq!(g.percent().unwrap(), 50);
    }
}
