// Flash LED on a GPIO line (BCM27, active high)
//
// Lit for the length of one capture. Every `on` arms a watchdog
// thread that forces the line low after `max_on`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::OutputPin;

use crate::drivers::HwError;

pub trait Flash {
    fn on(&mut self) -> Result<(), HwError>;
    fn off(&mut self) -> Result<(), HwError>;
    fn is_on(&self) -> bool;
}

struct Led<P> {
    pin: P,
    on: bool,
    // bumped on every `on`, so a stale watchdog leaves a newer flash alone
    generation: u32,
}

type Shared<P> = Arc<Mutex<CriticalSectionRawMutex, RefCell<Led<P>>>>;

pub struct FlashLed<P: OutputPin> {
    led: Shared<P>,
    max_on: Duration,
}

impl<P: OutputPin + Send + 'static> FlashLed<P> {
    pub fn new(mut pin: P, max_on: Duration) -> Result<Self, HwError> {
        pin.set_low().map_err(HwError::gpio)?;
        log::info!("flash: ready, max on {} ms", max_on.as_millis());
        Ok(Self {
            led: Arc::new(Mutex::new(RefCell::new(Led {
                pin,
                on: false,
                generation: 0,
            }))),
            max_on,
        })
    }

    fn spawn_watchdog(&self, generation: u32) {
        let led = Arc::clone(&self.led);
        let max_on = self.max_on;
        let spawned = thread::Builder::new()
            .name("flash-watchdog".into())
            .spawn(move || {
                thread::sleep(max_on);
                led.lock(|cell| {
                    let mut led = cell.borrow_mut();
                    if led.on && led.generation == generation {
                        log::warn!("flash: on for {} ms, forcing off", max_on.as_millis());
                        if let Err(e) = led.pin.set_low() {
                            log::warn!("flash: {}", HwError::gpio(e));
                        }
                        led.on = false;
                    }
                });
            });
        if let Err(e) = spawned {
            log::warn!("flash: no watchdog: {}", e);
        }
    }
}

impl<P: OutputPin + Send + 'static> Flash for FlashLed<P> {
    fn on(&mut self) -> Result<(), HwError> {
        let generation = self.led.lock(|cell| {
            let mut led = cell.borrow_mut();
            led.pin.set_high().map_err(HwError::gpio)?;
            led.on = true;
            led.generation = led.generation.wrapping_add(1);
            Ok::<_, HwError>(led.generation)
        })?;
        self.spawn_watchdog(generation);
        Ok(())
    }

    fn off(&mut self) -> Result<(), HwError> {
        self.led.lock(|cell| {
            let mut led = cell.borrow_mut();
            led.on = false;
            led.pin.set_low().map_err(HwError::gpio)
        })
    }

    fn is_on(&self) -> bool {
        self.led.lock(|cell| cell.borrow().on)
    }
}

impl<P: OutputPin> Drop for FlashLed<P> {
    fn drop(&mut self) {
        self.led.lock(|cell| {
            let mut led = cell.borrow_mut();
            if led.on {
                led.on = false;
                led.pin.set_low().ok();
            }
        });
    }
}

/// Records on/off transitions; cloned handles share the record.
#[derive(Clone, Default)]
pub struct SimFlash {
    states: Rc<RefCell<Vec<bool>>>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<bool> {
        self.states.borrow().clone()
    }
}

impl Flash for SimFlash {
    fn on(&mut self) -> Result<(), HwError> {
        self.states.borrow_mut().push(true);
        Ok(())
    }

    fn off(&mut self) -> Result<(), HwError> {
        self.states.borrow_mut().push(false);
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.states.borrow().last().copied().unwrap_or(false)
    }
}
