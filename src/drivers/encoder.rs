// Quadrature rotary encoder (KY-040 style, 4 transitions per detent)
//
// Gray-code state table: index is (previous AB << 2) | current AB.
// Illegal double-steps score 0, so contact bounce cancels out
// instead of producing phantom detents.

use embedded_hal::digital::InputPin;

use crate::drivers::HwError;

const STEPS_PER_DETENT: i8 = 4;

#[rustfmt::skip]
const TRANSITIONS: [i8; 16] = [
     0, -1,  1,  0,
     1,  0,  0, -1,
    -1,  0,  0,  1,
     0,  1, -1,  0,
];

/// Pin-free decoder; feed it samples of the two channels.
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    last: u8,
    accum: i8,
}

impl QuadratureDecoder {
    pub fn new(a: bool, b: bool) -> Self {
        Self {
            last: state(a, b),
            accum: 0,
        }
    }

    /// Returns +1/-1 once a full detent has been traversed.
    pub fn feed(&mut self, a: bool, b: bool) -> Option<i8> {
        let now = state(a, b);
        if now == self.last {
            return None;
        }
        self.accum += TRANSITIONS[((self.last << 2) | now) as usize];
        self.last = now;

        if self.accum >= STEPS_PER_DETENT {
            self.accum = 0;
            Some(1)
        } else if self.accum <= -STEPS_PER_DETENT {
            self.accum = 0;
            Some(-1)
        } else {
            None
        }
    }
}

#[inline]
fn state(a: bool, b: bool) -> u8 {
    ((a as u8) << 1) | b as u8
}

pub struct Encoder<A, B> {
    a: A,
    b: B,
    decoder: QuadratureDecoder,
}

impl<A: InputPin, B: InputPin> Encoder<A, B> {
    pub fn new(mut a: A, mut b: B) -> Result<Self, HwError> {
        let sa = a.is_high().map_err(HwError::gpio)?;
        let sb = b.is_high().map_err(HwError::gpio)?;
        Ok(Self {
            a,
            b,
            decoder: QuadratureDecoder::new(sa, sb),
        })
    }

    pub fn poll(&mut self) -> Result<Option<i8>, HwError> {
        let sa = self.a.is_high().map_err(HwError::gpio)?;
        let sb = self.b.is_high().map_err(HwError::gpio)?;
        Ok(self.decoder.feed(sa, sb))
    }
}
