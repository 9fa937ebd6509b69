// Power state machine: active, standby, shutdown
//
//   Active  --idle >= standby_timeout-->  Standby   (backlight 0)
//   Standby --touch/key/encoder/button--> Active    (backlight restored)
//   Active  --push held >= shutdown_hold-->  ShutdownRequested
//   ShutdownRequested --begin_shutdown-->  ShutdownInProgress
//
// Shutdown states are terminal. The long press is only measured while
// Active: a press that wakes the device from standby never arms it.
// All time comes in as `now` so the machine is deterministic in tests.

use core::fmt;
use std::time::{Duration, Instant};

use crate::board::{Button, InputEvent};
use crate::drivers::backlight::Backlight;

pub const DEFAULT_STANDBY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_HOLD: Duration = Duration::from_millis(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Active,
    Standby,
    ShutdownRequested,
    ShutdownInProgress,
}

impl PowerState {
    pub const fn name(self) -> &'static str {
        match self {
            PowerState::Active => "active",
            PowerState::Standby => "standby",
            PowerState::ShutdownRequested => "shutdown_requested",
            PowerState::ShutdownInProgress => "shutdown_in_progress",
        }
    }

    pub const fn is_shutdown(self) -> bool {
        matches!(
            self,
            PowerState::ShutdownRequested | PowerState::ShutdownInProgress
        )
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTimings {
    pub standby_timeout: Duration,
    pub shutdown_hold: Duration,
}

impl Default for PowerTimings {
    fn default() -> Self {
        Self {
            standby_timeout: DEFAULT_STANDBY_TIMEOUT,
            shutdown_hold: DEFAULT_SHUTDOWN_HOLD,
        }
    }
}

impl PowerTimings {
    /// Non-positive or non-finite values fall back to the defaults.
    pub fn from_secs(standby_s: f64, hold_s: f64) -> Self {
        Self {
            standby_timeout: positive_or(standby_s, DEFAULT_STANDBY_TIMEOUT, "standby_timeout"),
            shutdown_hold: positive_or(hold_s, DEFAULT_SHUTDOWN_HOLD, "shutdown_hold"),
        }
    }
}

fn positive_or(secs: f64, default: Duration, what: &str) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            log::warn!("power: invalid {} {}, using {:?}", what, secs, default);
            default
        }
    }
}

pub struct PowerManager {
    state: PowerState,
    backlight: Box<dyn Backlight>,
    level: u8,
    timings: PowerTimings,
    motion_keeps_awake: bool,
    last_activity: Instant,
    hold_since: Option<Instant>,
}

impl PowerManager {
    pub fn new(
        backlight: Box<dyn Backlight>,
        level: u8,
        timings: PowerTimings,
        motion_keeps_awake: bool,
        now: Instant,
    ) -> Self {
        let mut pm = Self {
            state: PowerState::Active,
            backlight,
            level,
            timings,
            motion_keeps_awake,
            last_activity: now,
            hold_since: None,
        };
        pm.apply(level);
        log::info!(
            "power: active, backlight {}, standby after {:?}, hold {:?}",
            level,
            timings.standby_timeout,
            timings.shutdown_hold
        );
        pm
    }

    #[inline]
    pub fn state(&self) -> PowerState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == PowerState::Active
    }

    #[inline]
    pub fn is_standby(&self) -> bool {
        self.state == PowerState::Standby
    }

    /// User brightness level, restored on every wake.
    pub fn brightness(&self) -> u8 {
        self.level
    }

    pub fn timings(&self) -> PowerTimings {
        self.timings
    }

    /// Applied immediately while Active, remembered otherwise.
    pub fn set_brightness(&mut self, level: u8) {
        if level == self.level {
            return;
        }
        self.level = level;
        if self.is_active() {
            self.apply(level);
        }
    }

    /// Feeds one input event. Returns true if it woke the device.
    pub fn on_event(&mut self, ev: &InputEvent, now: Instant) -> bool {
        match self.state {
            PowerState::ShutdownRequested | PowerState::ShutdownInProgress => false,
            PowerState::Standby => {
                if ev.is_wake_trigger() {
                    self.wake(now);
                    true
                } else {
                    false
                }
            }
            PowerState::Active => {
                if matches!(ev, InputEvent::Quit) {
                    return false;
                }
                self.last_activity = now;
                match ev {
                    InputEvent::ButtonDown(Button::EncoderPush) => {
                        self.hold_since = Some(now);
                    }
                    InputEvent::ButtonUp(Button::EncoderPush) => {
                        self.check_hold(now);
                        self.hold_since = None;
                    }
                    _ => {}
                }
                false
            }
        }
    }

    /// A moving reading from the gyro counts as activity when enabled.
    pub fn note_motion(&mut self, moving: bool, now: Instant) {
        if moving && self.motion_keeps_awake && self.is_active() {
            self.last_activity = now;
        }
    }

    /// Returns true if the state changed.
    pub fn enter_standby(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = PowerState::Standby;
        self.hold_since = None;
        self.apply(0);
        log::info!("power: standby");
        true
    }

    /// Returns true if the state changed.
    pub fn wake(&mut self, now: Instant) -> bool {
        if !self.is_standby() {
            return false;
        }
        self.state = PowerState::Active;
        self.last_activity = now;
        self.apply(self.level);
        log::info!("power: wake, backlight {}", self.level);
        true
    }

    /// Time-driven transitions; call once per frame.
    pub fn tick(&mut self, now: Instant) {
        if !self.is_active() {
            return;
        }
        self.check_hold(now);
        if self.is_active() && now.saturating_duration_since(self.last_activity) >= self.timings.standby_timeout {
            self.enter_standby();
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.state == PowerState::ShutdownRequested
    }

    /// Moves a pending request into progress. True exactly once.
    pub fn begin_shutdown(&mut self) -> bool {
        if self.state != PowerState::ShutdownRequested {
            return false;
        }
        self.state = PowerState::ShutdownInProgress;
        log::warn!("power: shutdown in progress");
        true
    }

    fn check_hold(&mut self, now: Instant) {
        if !self.is_active() {
            return;
        }
        if let Some(since) = self.hold_since
            && now.saturating_duration_since(since) >= self.timings.shutdown_hold
        {
            self.hold_since = None;
            self.state = PowerState::ShutdownRequested;
            log::warn!(
                "power: push held {:?}, shutdown requested",
                now.saturating_duration_since(since)
            );
        }
    }

    fn apply(&mut self, level: u8) {
        if let Err(e) = self.backlight.set_brightness(level) {
            log::warn!("power: backlight {}: {}", level, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::backlight::SimBacklight;

    const PUSH_DOWN: InputEvent = InputEvent::ButtonDown(Button::EncoderPush);
    const PUSH_UP: InputEvent = InputEvent::ButtonUp(Button::EncoderPush);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn manager(t0: Instant) -> (PowerManager, SimBacklight) {
        let bl = SimBacklight::new();
        let pm = PowerManager::new(Box::new(bl.clone()), 120, PowerTimings::default(), true, t0);
        (pm, bl)
    }

    #[test]
    fn idle_timeout_enters_standby_and_touch_wakes() {
        let t0 = Instant::now();
        let (mut pm, bl) = manager(t0);

        pm.tick(t0 + ms(29_999));
        assert!(pm.is_active());
        pm.tick(t0 + ms(30_000));
        assert_eq!(pm.state(), PowerState::Standby);
        assert_eq!(bl.current(), Some(0));

        let woke = pm.on_event(&InputEvent::TouchDown { x: 1, y: 1 }, t0 + ms(31_000));
        assert!(woke);
        assert!(pm.is_active());
        assert_eq!(bl.levels(), [120, 0, 120]);
    }

    #[test]
    fn input_resets_idle_timer() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.on_event(&InputEvent::EncoderTurn(1), t0 + ms(20_000));
        pm.tick(t0 + ms(40_000));
        assert!(pm.is_active());
        pm.tick(t0 + ms(50_000));
        assert!(pm.is_standby());
    }

    #[test]
    fn standby_and_wake_are_idempotent() {
        let t0 = Instant::now();
        let (mut pm, bl) = manager(t0);
        assert!(!pm.wake(t0));
        assert!(pm.enter_standby());
        assert!(!pm.enter_standby());
        assert!(pm.wake(t0));
        assert!(!pm.wake(t0));
        assert_eq!(bl.levels(), [120, 0, 120]);
    }

    #[test]
    fn release_and_non_wake_events_do_not_wake() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.enter_standby();
        assert!(!pm.on_event(&InputEvent::TouchUp { x: 0, y: 0 }, t0));
        assert!(!pm.on_event(&PUSH_UP, t0));
        assert!(pm.is_standby());
    }

    #[test]
    fn long_press_while_active_requests_shutdown() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.on_event(&PUSH_DOWN, t0);
        pm.tick(t0 + ms(1_799));
        assert!(pm.is_active());
        pm.tick(t0 + ms(1_800));
        assert!(pm.shutdown_requested());

        assert!(pm.begin_shutdown());
        assert!(!pm.begin_shutdown());
        assert_eq!(pm.state(), PowerState::ShutdownInProgress);
    }

    #[test]
    fn release_measures_the_hold_too() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.on_event(&PUSH_DOWN, t0);
        pm.on_event(&PUSH_UP, t0 + ms(2_000));
        assert!(pm.shutdown_requested());
    }

    #[test]
    fn short_press_does_nothing() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.on_event(&PUSH_DOWN, t0);
        pm.on_event(&PUSH_UP, t0 + ms(300));
        pm.tick(t0 + ms(5_000));
        assert!(pm.is_active());
    }

    #[test]
    fn press_that_wakes_never_arms_the_hold() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.enter_standby();

        assert!(pm.on_event(&PUSH_DOWN, t0 + ms(100)));
        pm.tick(t0 + ms(5_000));
        pm.on_event(&PUSH_UP, t0 + ms(5_100));
        assert_eq!(pm.state(), PowerState::Active);
    }

    #[test]
    fn hold_is_dropped_on_standby() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.on_event(&PUSH_DOWN, t0);
        pm.enter_standby();
        pm.wake(t0 + ms(100));
        pm.tick(t0 + ms(3_000));
        assert!(pm.is_active());
    }

    #[test]
    fn shutdown_is_terminal() {
        let t0 = Instant::now();
        let (mut pm, bl) = manager(t0);
        pm.on_event(&PUSH_DOWN, t0);
        pm.tick(t0 + ms(2_000));
        assert!(!pm.on_event(&InputEvent::TouchDown { x: 0, y: 0 }, t0 + ms(2_100)));
        assert!(!pm.enter_standby());
        assert!(!pm.wake(t0 + ms(2_200)));
        pm.tick(t0 + ms(60_000));
        assert!(pm.shutdown_requested());
        assert_eq!(bl.levels(), [120]);
    }

    #[test]
    fn brightness_change_in_standby_applies_on_wake() {
        let t0 = Instant::now();
        let (mut pm, bl) = manager(t0);
        pm.set_brightness(200);
        pm.enter_standby();
        pm.set_brightness(40);
        assert_eq!(bl.current(), Some(0));
        pm.wake(t0);
        assert_eq!(bl.levels(), [120, 200, 0, 40]);
    }

    #[test]
    fn motion_keeps_awake_when_enabled() {
        let t0 = Instant::now();
        let (mut pm, _) = manager(t0);
        pm.note_motion(true, t0 + ms(25_000));
        pm.tick(t0 + ms(40_000));
        assert!(pm.is_active());

        let bl = SimBacklight::new();
        let mut off = PowerManager::new(Box::new(bl), 120, PowerTimings::default(), false, t0);
        off.note_motion(true, t0 + ms(25_000));
        off.tick(t0 + ms(40_000));
        assert!(off.is_standby());
    }

    #[test]
    fn invalid_timings_fall_back() {
        let t = PowerTimings::from_secs(0.0, f64::NAN);
        assert_eq!(t, PowerTimings::default());
        let t = PowerTimings::from_secs(-5.0, 2.5);
        assert_eq!(t.standby_timeout, DEFAULT_STANDBY_TIMEOUT);
        assert_eq!(t.shutdown_hold, ms(2_500));
    }
}
