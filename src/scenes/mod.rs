// Scene trait, scene ids, and the Services boundary scenes call into.
//
// A scene never owns hardware. Everything it touches (camera, flash,
// photo directory, haptics, config) goes through Services, which the app
// lends out per call inside a SceneContext.

pub mod boot;
pub mod camera;
pub mod fallback;
pub mod gallery;
pub mod photo_cache;
pub mod registry;
pub mod settings;

use core::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::board::{Action, Button, Key};
use crate::config::{Config, ConfigError};
use crate::display::Framebuffer;
use crate::drivers::HwError;
use crate::drivers::camera::{CameraBackend, TestPatternCamera};
use crate::drivers::flash::{Flash, SimFlash};
use crate::drivers::haptic::{Haptic, SimHaptic};
use crate::drivers::sensor::SensorReading;
use crate::drivers::storage::{ImageLoader, PhotoError, PhotoLoader, PhotoStore};
use crate::ui::Gesture;

pub use photo_cache::PhotoCache;
pub use registry::{Hook, HookCall, NavEvent, SceneRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneId {
    Boot,
    Camera,
    Settings,
    Gallery,
    Fallback,
}

impl SceneId {
    pub const fn name(self) -> &'static str {
        match self {
            SceneId::Boot => "boot",
            SceneId::Camera => "camera",
            SceneId::Settings => "settings",
            SceneId::Gallery => "gallery",
            SceneId::Fallback => "fallback",
        }
    }

    /// Accepts "main" as the camera scene, as hitbox files name it.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boot" => Some(SceneId::Boot),
            "camera" | "main" => Some(SceneId::Camera),
            "settings" => Some(SceneId::Settings),
            "gallery" => Some(SceneId::Gallery),
            "fallback" => Some(SceneId::Fallback),
            _ => None,
        }
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Goto(SceneId),
}

/// Input as a scene sees it: logical coordinates, decoded gestures,
/// hitbox actions already resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEvent {
    /// Touch-down that hit no hitbox.
    Touch { x: u16, y: u16 },
    Gesture(Gesture),
    Action(Action),
    Key(Key),
    Encoder(i8),
    ButtonDown(Button),
    ButtonUp(Button),
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Hw(#[from] HwError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Other(String),
}

/// Haptic cues; effect ids come from the haptic config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Tick,
    Confirm,
    Capture,
    Error,
}

pub struct Services {
    pub config: Config,
    pub camera: Box<dyn CameraBackend>,
    pub flash: Box<dyn Flash>,
    pub photos: PhotoStore,
    pub loader: Box<dyn PhotoLoader>,
    pub haptic: Box<dyn Haptic>,
}

impl Services {
    /// Desktop stand-ins rooted at `data_dir`.
    pub fn simulated(data_dir: &Path) -> Self {
        let mut config = Config::default();
        config.storage.photos_dir = data_dir.join("photos");
        config.storage.health_file = None;
        Self::simulated_with(config, SimHaptic::new())
    }

    pub fn simulated_with(config: Config, haptic: SimHaptic) -> Self {
        let cam = &config.camera;
        let camera = TestPatternCamera::new(
            (cam.preview_width, cam.preview_height),
            (cam.capture_width, cam.capture_height),
        );
        Self {
            photos: PhotoStore::new(config.storage.photos_dir.clone()),
            loader: Box::new(ImageLoader::new(
                crate::display::LOGICAL_W as u32,
                crate::display::LOGICAL_H as u32,
            )),
            camera: Box::new(camera),
            flash: Box::new(SimFlash::new()),
            haptic: Box::new(haptic),
            config,
        }
    }

    /// Forces the LED dark; failures are only logged.
    pub fn flash_off(&mut self) {
        if let Err(e) = self.flash.off() {
            log::warn!("flash: {}", e);
        }
    }

    /// Best effort; a missing or failing motor is only logged.
    pub fn pulse(&mut self, cue: Feedback) {
        let h = &self.config.haptic;
        if !h.enabled {
            return;
        }
        let effect = match cue {
            Feedback::Tick => h.tick,
            Feedback::Confirm => h.confirm,
            Feedback::Capture => h.capture,
            Feedback::Error => h.error,
        };
        if let Err(e) = self.haptic.pulse(effect) {
            log::debug!("haptic: {:?}: {}", cue, e);
        }
    }
}

/// Per-call view of the app handed to a scene.
pub struct SceneContext<'a> {
    pub services: &'a mut Services,
    pub sensors: SensorReading,
    pub now: Instant,
    config_changed: bool,
}

impl<'a> SceneContext<'a> {
    pub fn new(services: &'a mut Services, sensors: SensorReading, now: Instant) -> Self {
        Self {
            services,
            sensors,
            now,
            config_changed: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.services.config
    }

    #[inline]
    pub fn pulse(&mut self, cue: Feedback) {
        self.services.pulse(cue);
    }

    /// Asks the app to persist config and reapply brightness.
    pub fn mark_config_changed(&mut self) {
        self.config_changed = true;
    }

    pub fn config_changed(&self) -> bool {
        self.config_changed
    }
}

pub trait Scene {
    fn id(&self) -> SceneId;

    /// Once, at registration.
    fn initialize(&mut self, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError>;

    fn on_exit(&mut self, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: SceneEvent,
        ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError>;

    fn update(&mut self, _dt: Duration, _ctx: &mut SceneContext<'_>) -> Result<Transition, SceneError> {
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) -> Result<(), SceneError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_names_round_trip() {
        for id in [SceneId::Boot, SceneId::Camera, SceneId::Settings, SceneId::Gallery] {
            assert_eq!(SceneId::from_name(id.name()), Some(id));
        }
        assert_eq!(SceneId::from_name("main"), Some(SceneId::Camera));
        assert_eq!(SceneId::from_name("viewer"), None);
    }

    #[test]
    fn pulses_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHaptic::new();
        let mut cfg = Config::default();
        cfg.storage.photos_dir = dir.path().to_path_buf();
        let mut s = Services::simulated_with(cfg, sim.clone());

        s.pulse(Feedback::Capture);
        s.config.haptic.enabled = false;
        s.pulse(Feedback::Tick);
        assert_eq!(sim.played(), [47]);
    }
}
