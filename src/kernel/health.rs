// Health file
//
// A small JSON snapshot rewritten every few seconds so a watchdog or
// an ssh session can see what the app is doing without attaching to
// it. Writes go through a temp file and rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ConfigError;

pub const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub timestamp: String,
    pub uptime_s: u64,
    pub fps: f32,
    pub frame_ms: f32,
    pub frames: u64,
    pub scene: &'static str,
    pub power_state: &'static str,
    pub faulted: bool,
    pub battery_pct: Option<u8>,
}

pub struct HealthWriter {
    path: PathBuf,
    interval: Duration,
    last: Option<Instant>,
}

impl HealthWriter {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn due(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|t| now.saturating_duration_since(t) >= self.interval)
    }

    /// Writes if the interval has passed. Failures are logged only.
    pub fn maybe_write(&mut self, now: Instant, snapshot: impl FnOnce() -> HealthSnapshot) {
        if !self.due(now) {
            return;
        }
        self.last = Some(now);
        if let Err(e) = self.write(&snapshot()) {
            log::warn!("health: {}: {}", self.path.display(), e);
        }
    }

    pub fn write(&self, snap: &HealthSnapshot) -> Result<(), ConfigError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_owned(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, snap)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap() -> HealthSnapshot {
        HealthSnapshot {
            timestamp: chrono::Local::now().to_rfc3339(),
            uptime_s: 12,
            fps: 29.5,
            frame_ms: 4.0,
            frames: 360,
            scene: "camera",
            power_state: "active",
            faulted: false,
            battery_pct: Some(88),
        }
    }

    #[test]
    fn writes_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.json");
        let mut w = HealthWriter::new(&path, HEALTH_INTERVAL);
        let t0 = Instant::now();

        w.maybe_write(t0, snap);
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["scene"], "camera");
        assert_eq!(v["battery_pct"], 88);

        let mut called = false;
        w.maybe_write(t0 + Duration::from_secs(1), || {
            called = true;
            snap()
        });
        assert!(!called);
        assert!(w.due(t0 + HEALTH_INTERVAL));
    }

    #[test]
    fn unwritable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let mut w = HealthWriter::new(blocker.join("health.json"), HEALTH_INTERVAL);
        w.maybe_write(Instant::now(), snap);
        assert!(w.write(&snap()).is_err());
    }
}
