// Persistent configuration.
// JSON at $POCKETCAM_CONFIG or <data dir>/config.json, one typed
// section per subsystem. Every field has a default, so partial files
// load, and a field of the wrong type falls back on its own without
// taking the rest of its section with it. sanitize() clamps whatever
// made it through parsing. Unknown top-level sections are carried
// through load/save untouched.
// Saves are atomic: temp file in the same directory, fsync, rename.
// A file that is not JSON at all is never overwritten.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::display::Rotation;

pub const CONFIG_ENV: &str = "POCKETCAM_CONFIG";
pub const CONFIG_FILE: &str = "config.json";

const PI_DATA_DIR: &str = "/home/pi/camera_app_data";
const LOCAL_DATA_DIR: &str = "camera_app_data";
const MAX_FLASH_ON_MS: u64 = 5000;

/// `/home/pi/camera_app_data` on the device, `./camera_app_data` elsewhere.
pub fn default_data_dir() -> PathBuf {
    if Path::new("/home/pi").is_dir() {
        PathBuf::from(PI_DATA_DIR)
    } else {
        PathBuf::from(LOCAL_DATA_DIR)
    }
}

pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(p) => PathBuf::from(p),
        None => default_data_dir().join(CONFIG_FILE),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config i/o: {0}")]
    Io(#[from] io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config persist: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("{0} was unreadable at startup, leaving it alone")]
    Held(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessMode {
    #[default]
    Auto,
    Dark,
    Medium,
    Bright,
}

impl BrightnessMode {
    pub const ALL: [BrightnessMode; 4] = [
        BrightnessMode::Auto,
        BrightnessMode::Dark,
        BrightnessMode::Medium,
        BrightnessMode::Bright,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            BrightnessMode::Auto => "Auto",
            BrightnessMode::Dark => "Dark",
            BrightnessMode::Medium => "Medium",
            BrightnessMode::Bright => "Bright",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

impl FlashMode {
    pub const ALL: [FlashMode; 3] = [FlashMode::Off, FlashMode::On, FlashMode::Auto];

    pub const fn label(self) -> &'static str {
        match self {
            FlashMode::Off => "Off",
            FlashMode::On => "On",
            FlashMode::Auto => "Auto",
        }
    }

    pub const fn next(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::On,
            FlashMode::On => FlashMode::Auto,
            FlashMode::Auto => FlashMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoDisplay {
    Off,
    #[default]
    Minimal,
}

impl InfoDisplay {
    pub const fn label(self) -> &'static str {
        match self {
            InfoDisplay::Off => "Off",
            InfoDisplay::Minimal => "Minimal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Clockwise rotation of the rendered frame, degrees. Calibrated per mount.
    pub rotation: u16,
    pub brightness_mode: BrightnessMode,
    pub brightness_dark: u8,
    pub brightness_medium: u8,
    pub brightness_bright: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rotation: 90,
            brightness_mode: BrightnessMode::Auto,
            brightness_dark: 40,
            brightness_medium: 120,
            brightness_bright: 220,
        }
    }
}

impl DisplayConfig {
    pub fn rotation(&self) -> Rotation {
        Rotation::from_degrees(self.rotation).unwrap_or(Rotation::Deg90)
    }

    /// Backlight level for the current mode; auto maps lux on a log
    /// curve from the dark level (0 lux) to the bright level (500 lux).
    pub fn brightness_level(&self, lux: Option<f32>) -> u8 {
        match self.brightness_mode {
            BrightnessMode::Dark => self.brightness_dark,
            BrightnessMode::Medium => self.brightness_medium,
            BrightnessMode::Bright => self.brightness_bright,
            BrightnessMode::Auto => match lux {
                None => self.brightness_medium,
                Some(l) if !(l >= 1.0) => self.brightness_dark,
                Some(l) => {
                    let lo = self.brightness_dark as f32;
                    let hi = self.brightness_bright.max(self.brightness_dark) as f32;
                    let level = lo + (hi - lo) * (l + 1.0).ln() / 501f32.ln();
                    level.round().clamp(lo, hi) as u8
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub preview_width: u16,
    pub preview_height: u16,
    pub preview_fps: u16,
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            preview_width: 640,
            preview_height: 480,
            preview_fps: 24,
            capture_width: 2592,
            capture_height: 1944,
            capture_quality: 92,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    pub mode: FlashMode,
    pub auto_threshold_lux: f32,
    /// Watchdog limit on how long the LED may stay lit.
    pub max_on_ms: u64,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            mode: FlashMode::Off,
            auto_threshold_lux: 60.0,
            max_on_ms: 1500,
        }
    }
}

impl FlashConfig {
    /// Auto fires only on a known-dark reading; no light sensor means no flash.
    pub fn should_fire(&self, lux: Option<f32>) -> bool {
        match self.mode {
            FlashMode::Off => false,
            FlashMode::On => true,
            FlashMode::Auto => lux.is_some_and(|l| l < self.auto_threshold_lux),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub grid_enabled: bool,
    pub level_enabled: bool,
    pub info_display: InfoDisplay,
    pub freeze_duration_ms: u64,
    pub boot_duration_s: f32,
    pub touch_debug_overlay: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            grid_enabled: false,
            level_enabled: false,
            info_display: InfoDisplay::Minimal,
            freeze_duration_ms: 700,
            boot_duration_s: 1.5,
            touch_debug_overlay: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticConfig {
    pub enabled: bool,
    pub tick: u8,
    pub confirm: u8,
    pub capture: u8,
    pub error: u8,
}

impl Default for HapticConfig {
    fn default() -> Self {
        // DRV2605L LRA library effect ids
        Self {
            enabled: true,
            tick: 1,
            confirm: 10,
            capture: 47,
            error: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub standby_timeout_s: f64,
    pub shutdown_long_press_s: f64,
    pub shutdown_delay_s: f64,
    pub sensor_join_timeout_s: f64,
    pub motion_keeps_awake: bool,
    pub shutdown_command: Vec<String>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            standby_timeout_s: 30.0,
            shutdown_long_press_s: 1.8,
            shutdown_delay_s: 1.5,
            sensor_join_timeout_s: 1.0,
            motion_keeps_awake: true,
            shutdown_command: ["sudo", "shutdown", "-h", "now"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub photos_dir: PathBuf,
    pub max_photos: usize,
    pub health_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            photos_dir: data.join("photos"),
            max_photos: 500,
            health_file: Some(data.join("health.json")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub camera: CameraConfig,
    pub flash: FlashConfig,
    pub ui: UiConfig,
    pub haptic: HapticConfig,
    pub power: PowerConfig,
    pub storage: StorageConfig,
    /// Sections this build does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    /// Errors only when `data` is not JSON. Bad values inside it fall
    /// back to defaults field by field.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_json::from_str(data)?;
        Ok(Self::from_value(raw))
    }

    pub fn from_value(raw: Value) -> Self {
        let Value::Object(mut map) = raw else {
            log::warn!("config: top level is not an object, using defaults");
            return Config::default();
        };
        let mut cfg = Config {
            display: section(&mut map, "display"),
            camera: section(&mut map, "camera"),
            flash: section(&mut map, "flash"),
            ui: section(&mut map, "ui"),
            haptic: section(&mut map, "haptic"),
            power: section(&mut map, "power"),
            storage: section(&mut map, "storage"),
            extra: map,
        };
        cfg.sanitize();
        cfg
    }

    pub fn sanitize(&mut self) {
        let defaults = Config::default();

        if Rotation::from_degrees(self.display.rotation).is_none() {
            log::warn!(
                "config: display.rotation {} invalid, using {}",
                self.display.rotation,
                defaults.display.rotation
            );
            self.display.rotation = defaults.display.rotation;
        }

        self.camera.capture_quality = self.camera.capture_quality.clamp(1, 100);
        self.camera.preview_fps = self.camera.preview_fps.clamp(1, 60);
        if self.camera.preview_width == 0 || self.camera.preview_height == 0 {
            self.camera.preview_width = defaults.camera.preview_width;
            self.camera.preview_height = defaults.camera.preview_height;
        }

        if !self.flash.auto_threshold_lux.is_finite() || self.flash.auto_threshold_lux < 0.0 {
            self.flash.auto_threshold_lux = defaults.flash.auto_threshold_lux;
        }
        if self.flash.max_on_ms == 0 {
            self.flash.max_on_ms = defaults.flash.max_on_ms;
        }
        self.flash.max_on_ms = self.flash.max_on_ms.min(MAX_FLASH_ON_MS);

        if !self.ui.boot_duration_s.is_finite() || self.ui.boot_duration_s < 0.0 {
            self.ui.boot_duration_s = defaults.ui.boot_duration_s;
        }
        self.ui.freeze_duration_ms = self.ui.freeze_duration_ms.min(10_000);

        if !self.power.shutdown_delay_s.is_finite() || self.power.shutdown_delay_s < 0.0 {
            self.power.shutdown_delay_s = defaults.power.shutdown_delay_s;
        }
        self.power.shutdown_delay_s = self.power.shutdown_delay_s.min(10.0);
        if !(self.power.sensor_join_timeout_s > 0.0) || !self.power.sensor_join_timeout_s.is_finite()
        {
            self.power.sensor_join_timeout_s = defaults.power.sensor_join_timeout_s;
        }
        if self.power.shutdown_command.is_empty() {
            log::warn!("config: power.shutdown_command empty, using default");
            self.power.shutdown_command = defaults.power.shutdown_command;
        }

        self.storage.max_photos = self.storage.max_photos.max(1);
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// Takes `name` out of `map`. Fields are laid over the section defaults
// one at a time; a field the section type rejects keeps its default.
fn section<T>(map: &mut Map<String, Value>, name: &str) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    let Some(raw) = map.remove(name) else {
        return T::default();
    };
    if let Ok(parsed) = serde_json::from_value::<T>(raw.clone()) {
        return parsed;
    }
    let Value::Object(fields) = raw else {
        log::warn!("config: {} is not an object, using defaults", name);
        return T::default();
    };
    let mut merged = match serde_json::to_value(T::default()) {
        Ok(Value::Object(m)) => m,
        _ => return T::default(),
    };
    for (key, value) in fields {
        let prev = merged.insert(key.clone(), value);
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            log::warn!("config: {}.{} invalid, using default", name, key);
            match prev {
                Some(p) => merged.insert(key, p),
                None => merged.remove(&key),
            };
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

/// Where the config lives and how it gets there.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    // the file on disk could not be parsed; saves are refused
    held: bool,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing file writes defaults, one that is not JSON
    /// is left alone for the operator and defaults are used for this
    /// session without ever being saved over it.
    pub fn load(&mut self) -> Config {
        match fs::read_to_string(&self.path) {
            Ok(data) => match Config::from_json(&data) {
                Ok(cfg) => {
                    log::info!("config: loaded {}", self.path.display());
                    cfg
                }
                Err(e) => {
                    log::warn!("config: {}: {}, using defaults", self.path.display(), e);
                    self.held = true;
                    Config::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("config: {} not found, writing defaults", self.path.display());
                let cfg = Config::default();
                if let Err(e) = self.save(&cfg) {
                    log::warn!("config: could not write defaults: {}", e);
                }
                cfg
            }
            Err(e) => {
                log::warn!("config: {}: {}, using defaults", self.path.display(), e);
                Config::default()
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if self.held {
            return Err(ConfigError::Held(self.path.clone()));
        }
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_owned(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(cfg.to_json()?.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        log::debug!("config: saved {}", self.path.display());
        Ok(())
    }
}
