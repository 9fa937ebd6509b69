// Shutdown sequence
//
// Runs synchronously once the power manager is in ShutdownInProgress.
// Every step is best effort: a failure is logged and the next step
// still runs, so the OS command is always reached.

use std::time::Duration;

use crate::config::ConfigError;
use crate::drivers::HwError;
use crate::drivers::shutdown::ShutdownError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShutdownPlan {
    pub delay: Duration,
    pub sensor_timeout: Duration,
}

impl Default for ShutdownPlan {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            sensor_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub notice_shown: bool,
    pub sensors_stopped: bool,
    pub config_saved: bool,
    pub powered_off: bool,
}

/// The collaborators touched while going down, in call order.
pub trait ShutdownSteps {
    fn show_notice(&mut self) -> Result<(), HwError>;
    fn pulse(&mut self) -> Result<(), HwError>;
    fn hold(&mut self, delay: Duration);
    /// True if the sensor thread finished within `timeout`.
    fn stop_sensors(&mut self, timeout: Duration) -> bool;
    fn save_config(&mut self) -> Result<(), ConfigError>;
    fn power_off(&mut self) -> Result<(), ShutdownError>;
}

pub fn execute(plan: &ShutdownPlan, steps: &mut dyn ShutdownSteps) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    log::warn!("shutdown: starting");

    match steps.show_notice() {
        Ok(()) => report.notice_shown = true,
        Err(e) => log::warn!("shutdown: notice: {}", e),
    }
    if let Err(e) = steps.pulse() {
        log::warn!("shutdown: haptic: {}", e);
    }

    steps.hold(plan.delay);

    report.sensors_stopped = steps.stop_sensors(plan.sensor_timeout);
    if !report.sensors_stopped {
        log::warn!("shutdown: sensor thread still running, continuing");
    }

    match steps.save_config() {
        Ok(()) => report.config_saved = true,
        Err(e) => log::warn!("shutdown: saving config: {}", e),
    }

    match steps.power_off() {
        Ok(()) => report.powered_off = true,
        Err(e) => log::error!("shutdown: power off failed: {}", e),
    }
    report
}
