// DRV2605L haptic driver (LRA, internal trigger)
//
// Effects are ids from the LRA library (0x06): 1 strong click,
// 10 soft bump, 14 double click, 47 sharp click. Callers treat every
// failure as cosmetic and keep going.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::I2c;

use crate::drivers::HwError;

mod reg {
    pub const STATUS: u8 = 0x00;
    pub const MODE: u8 = 0x01;
    pub const LIBRARY: u8 = 0x03;
    pub const WAVEFORM_SEQ_1: u8 = 0x04;
    pub const WAVEFORM_SEQ_2: u8 = 0x05;
    pub const GO: u8 = 0x0C;
    pub const RATED_VOLTAGE: u8 = 0x16;
    pub const CLAMP_VOLTAGE: u8 = 0x17;
    pub const FEEDBACK_CONTROL: u8 = 0x1A;
    pub const CONTROL3: u8 = 0x1D;
}

const MODE_INTERNAL_TRIGGER: u8 = 0x00;
const MODE_STANDBY: u8 = 0x40;
const LIB_LRA: u8 = 0x06;
const FEEDBACK_LRA: u8 = 0xB6;
const RATED_1V6: u8 = 0x59;
const CLAMP_2V5: u8 = 0x89;
const CONTROL3_LRA: u8 = 0x20;

const MAX_EFFECT: u8 = 123;

pub trait Haptic {
    /// Plays one library effect.
    fn pulse(&mut self, effect: u8) -> Result<(), HwError>;
}

pub struct Drv2605<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Drv2605<I2C> {
    pub fn new(mut i2c: I2C, addr: u8) -> Result<Self, HwError> {
        let mut status = [0u8; 1];
        i2c.write_read(addr, &[reg::STATUS], &mut status)
            .map_err(HwError::i2c)?;
        log::info!("haptic: DRV2605L at 0x{:02X}, status 0x{:02X}", addr, status[0]);

        let mut dev = Self { i2c, addr };
        dev.write(reg::MODE, MODE_INTERNAL_TRIGGER)?;
        dev.write(reg::LIBRARY, LIB_LRA)?;
        dev.write(reg::FEEDBACK_CONTROL, FEEDBACK_LRA)?;
        dev.write(reg::RATED_VOLTAGE, RATED_1V6)?;
        dev.write(reg::CLAMP_VOLTAGE, CLAMP_2V5)?;
        dev.write(reg::CONTROL3, CONTROL3_LRA)?;
        Ok(dev)
    }

    fn write(&mut self, reg: u8, val: u8) -> Result<(), HwError> {
        self.i2c
            .write(self.addr, &[reg, val])
            .map_err(HwError::i2c)
    }

    pub fn standby(&mut self) -> Result<(), HwError> {
        self.write(reg::MODE, MODE_STANDBY)
    }
}

impl<I2C: I2c> Haptic for Drv2605<I2C> {
    fn pulse(&mut self, effect: u8) -> Result<(), HwError> {
        let effect = effect.clamp(1, MAX_EFFECT);
        self.write(reg::WAVEFORM_SEQ_1, effect)?;
        self.write(reg::WAVEFORM_SEQ_2, 0x00)?; // end of sequence
        self.write(reg::GO, 0x01)
    }
}

/// No motor fitted.
pub struct NoHaptic;

impl Haptic for NoHaptic {
    fn pulse(&mut self, _effect: u8) -> Result<(), HwError> {
        Err(HwError::Absent("haptic"))
    }
}

/// Records effects played; cloned handles share the record.
#[derive(Clone, Default)]
pub struct SimHaptic {
    played: Rc<RefCell<Vec<u8>>>,
}

impl SimHaptic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<u8> {
        self.played.borrow().clone()
    }
}

impl Haptic for SimHaptic {
    fn pulse(&mut self, effect: u8) -> Result<(), HwError> {
        self.played.borrow_mut().push(effect);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

    /// Register-file I2C fake: records writes, answers reads from `regs`.
    #[derive(Clone, Default)]
    pub struct FakeI2c {
        pub writes: Rc<RefCell<Vec<(u8, Vec<u8>)>>>,
        pub regs: Rc<RefCell<HashMap<(u8, u8), Vec<u8>>>>,
        pub fail: bool,
    }

    impl FakeI2c {
        pub fn set_reg(&self, addr: u8, reg: u8, data: &[u8]) {
            self.regs.borrow_mut().insert((addr, reg), data.to_vec());
        }
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            let mut reg = None;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        reg = bytes.first().copied();
                        self.writes.borrow_mut().push((address, bytes.to_vec()));
                    }
                    Operation::Read(buf) => {
                        let regs = self.regs.borrow();
                        let src = reg.and_then(|r| regs.get(&(address, r)));
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = src.and_then(|s| s.get(i)).copied().unwrap_or(0);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
