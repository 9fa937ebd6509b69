// Background sensor polling
//
// One thread owns the I2C sensors and publishes the latest combined
// reading into a SensorSlot. The UI thread only ever takes snapshots,
// so a slow bus never stalls a frame. Rates: gyro 20 Hz, light 5 Hz,
// battery 1 Hz. Absent sensors leave their field at None / default.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::drivers::battery::FuelGauge;
use crate::drivers::light::LightMeter;
use crate::drivers::motion::{self, Gyro, TiltEstimator};

const GYRO_PERIOD: Duration = Duration::from_millis(50);
const LIGHT_PERIOD: Duration = Duration::from_millis(200);
const BATTERY_PERIOD: Duration = Duration::from_secs(1);
const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReading {
    pub tilt_deg: f32,
    pub moving: bool,
    pub lux: Option<f32>,
    pub battery_pct: Option<u8>,
}

/// Latest reading, overwritten in place.
pub struct SensorSlot {
    inner: Mutex<CriticalSectionRawMutex, Cell<SensorReading>>,
}

impl Default for SensorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(SensorReading::default())),
        }
    }

    pub fn publish(&self, reading: SensorReading) {
        self.inner.lock(|c| c.set(reading));
    }

    pub fn snapshot(&self) -> SensorReading {
        self.inner.lock(|c| c.get())
    }
}

#[derive(Default)]
pub struct SensorSources {
    pub gyro: Option<Box<dyn Gyro>>,
    pub light: Option<Box<dyn LightMeter>>,
    pub battery: Option<Box<dyn FuelGauge>>,
}

impl SensorSources {
    pub fn is_empty(&self) -> bool {
        self.gyro.is_none() && self.light.is_none() && self.battery.is_none()
    }
}

pub struct SensorThread {
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

// signals completion even if the loop panics
struct DoneGuard(mpsc::Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl SensorThread {
    pub fn spawn(sources: SensorSources, slot: Arc<SensorSlot>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, done) = mpsc::channel();
        let flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("sensors".into())
            .spawn(move || {
                let _guard = DoneGuard(tx);
                run(sources, &slot, &flag);
            })?;

        log::info!("sensors: polling thread started");
        Ok(Self {
            stop,
            done,
            handle: Some(handle),
        })
    }

    /// Asks the thread to stop and waits up to `timeout`. Returns false
    /// if it did not finish in time; the thread is then left detached.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::warn!("sensors: polling thread panicked");
                }
                log::info!("sensors: stopped");
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("sensors: did not stop within {:?}", timeout);
                false
            }
        }
    }
}

impl Drop for SensorThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(Duration::from_millis(100));
        }
    }
}

fn run(mut sources: SensorSources, slot: &SensorSlot, stop: &AtomicBool) {
    let mut tilt = TiltEstimator::new();
    let mut reading = SensorReading::default();
    let start = Instant::now();
    let mut last_gyro = start;
    let mut next_gyro = start;
    let mut next_light = start;
    let mut next_battery = start;
    let mut warned = [false; 3];

    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        let mut changed = false;

        if let Some(g) = sources.gyro.as_mut()
            && now >= next_gyro
        {
            next_gyro = now + GYRO_PERIOD;
            match g.read_rates() {
                Ok(rates) => {
                    reading.tilt_deg = tilt.update(rates, now - last_gyro);
                    reading.moving = motion::is_moving(rates);
                    last_gyro = now;
                    changed = true;
                    warned[0] = false;
                }
                Err(e) => warn_once(&mut warned[0], "gyro", &e),
            }
        }

        if let Some(l) = sources.light.as_mut()
            && now >= next_light
        {
            next_light = now + LIGHT_PERIOD;
            match l.read_lux() {
                Ok(lux) => {
                    reading.lux = Some(lux);
                    changed = true;
                    warned[1] = false;
                }
                Err(e) => warn_once(&mut warned[1], "light", &e),
            }
        }

        if let Some(b) = sources.battery.as_mut()
            && now >= next_battery
        {
            next_battery = now + BATTERY_PERIOD;
            match b.read_percent() {
                Ok(pct) => {
                    reading.battery_pct = Some(pct);
                    changed = true;
                    warned[2] = false;
                }
                Err(e) => warn_once(&mut warned[2], "battery", &e),
            }
        }

        if changed {
            slot.publish(reading);
        }
        thread::sleep(IDLE_SLEEP);
    }
}

fn warn_once(flag: &mut bool, what: &str, e: &crate::drivers::HwError) {
    if !*flag {
        log::warn!("sensors: {} read failed: {}", what, e);
        *flag = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::HwError;

    struct Level(f32);
    impl LightMeter for Level {
        fn read_lux(&mut self) -> Result<f32, HwError> {
            Ok(self.0)
        }
    }

    struct Full;
    impl FuelGauge for Full {
        fn read_percent(&mut self) -> Result<u8, HwError> {
            Ok(100)
        }
    }

    struct Stuck;
    impl Gyro for Stuck {
        fn read_rates(&mut self) -> Result<[f32; 3], HwError> {
            thread::sleep(Duration::from_millis(400));
            Ok([0.0; 3])
        }
    }

    fn wait_for(slot: &SensorSlot, f: impl Fn(&SensorReading) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if f(&slot.snapshot()) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn slot_starts_empty() {
        let slot = SensorSlot::new();
        assert_eq!(slot.snapshot(), SensorReading::default());
    }

    #[test]
    fn publishes_then_stops_in_time() {
        let slot = Arc::new(SensorSlot::new());
        let sources = SensorSources {
            light: Some(Box::new(Level(42.0))),
            battery: Some(Box::new(Full)),
            ..Default::default()
        };
        let mut t = SensorThread::spawn(sources, Arc::clone(&slot)).unwrap();
        assert!(wait_for(&slot, |r| r.lux == Some(42.0) && r.battery_pct == Some(100)));
        assert!(t.stop(Duration::from_secs(1)));
        // second stop is a no-op
        assert!(t.stop(Duration::from_millis(1)));
    }

    #[test]
    fn stuck_read_times_out() {
        let slot = Arc::new(SensorSlot::new());
        let sources = SensorSources {
            gyro: Some(Box::new(Stuck)),
            ..Default::default()
        };
        let mut t = SensorThread::spawn(sources, slot).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!t.stop(Duration::from_millis(20)));
    }
}
