// Debounced push buttons on GPIO
//
// One ButtonInput per line. Buttons are active low (pull-ups on the
// HAT). A level has to hold for DEBOUNCE_MS before it becomes the
// stable state; only stable transitions produce events. Long-press
// timing is not done here: the power manager measures the hold.
//
// 30ms debounce.

use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;

use crate::board::{Button, InputEvent};
use crate::drivers::encoder::Encoder;
use crate::drivers::{EventSource, HwError};

const DEBOUNCE_MS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Press(Button),
    Release(Button),
}

impl From<Event> for InputEvent {
    fn from(ev: Event) -> Self {
        match ev {
            Event::Press(b) => InputEvent::ButtonDown(b),
            Event::Release(b) => InputEvent::ButtonUp(b),
        }
    }
}

pub struct ButtonInput<P> {
    button: Button,
    pin: P,
    stable: bool,
    candidate: bool,
    candidate_since: Instant,
}

impl<P: InputPin> ButtonInput<P> {
    pub fn new(button: Button, pin: P, now: Instant) -> Self {
        Self {
            button,
            pin,
            stable: false,
            candidate: false,
            candidate_since: now,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    pub fn poll(&mut self, now: Instant) -> Result<Option<Event>, HwError> {
        let raw = self.pin.is_low().map_err(HwError::gpio)?;

        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = now;
        }

        if self.candidate == self.stable
            || now.saturating_duration_since(self.candidate_since)
                < Duration::from_millis(DEBOUNCE_MS)
        {
            return Ok(None);
        }

        self.stable = self.candidate;
        Ok(Some(if self.stable {
            Event::Press(self.button)
        } else {
            Event::Release(self.button)
        }))
    }
}

/// The camera body's physical controls as one event source.
pub struct BodyControls<A, B, P, S> {
    encoder: Encoder<A, B>,
    push: ButtonInput<P>,
    shutter: ButtonInput<S>,
    failed: bool,
}

impl<A, B, P, S> BodyControls<A, B, P, S>
where
    A: InputPin,
    B: InputPin,
    P: InputPin,
    S: InputPin,
{
    pub fn new(encoder: Encoder<A, B>, push: P, shutter: S, now: Instant) -> Self {
        Self {
            encoder,
            push: ButtonInput::new(Button::EncoderPush, push, now),
            shutter: ButtonInput::new(Button::Shutter, shutter, now),
            failed: false,
        }
    }

    fn poll_inner(&mut self, now: Instant, out: &mut Vec<InputEvent>) -> Result<(), HwError> {
        if let Some(steps) = self.encoder.poll()? {
            out.push(InputEvent::EncoderTurn(steps));
        }
        if let Some(ev) = self.push.poll(now)? {
            out.push(ev.into());
        }
        if let Some(ev) = self.shutter.poll(now)? {
            out.push(ev.into());
        }
        Ok(())
    }
}

impl<A, B, P, S> EventSource for BodyControls<A, B, P, S>
where
    A: InputPin,
    B: InputPin,
    P: InputPin,
    S: InputPin,
{
    fn poll(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        match self.poll_inner(now, out) {
            Ok(()) => self.failed = false,
            Err(e) => {
                // report once per failure streak, the poll rate is ~500Hz
                if !self.failed {
                    log::warn!("input: gpio read failed: {}", e);
                }
                self.failed = true;
            }
        }
    }
}
