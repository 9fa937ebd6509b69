// pocket-cam entry point and frame loop
//
// Startup: logger -> config -> hitboxes -> hardware or simulators -> App
// Loop: poll inputs -> run_frame -> poll inputs in 2ms slices until
// the next frame is due. The encoder is a polled quadrature pair, so
// the slices are what keeps fast turns from losing detents.
//
// Environment:
//   RUST_LOG            log filter, default "info"
//   POCKETCAM_CONFIG    config file (default <data dir>/config.json)
//   POCKETCAM_HITBOXES  hitbox file (default assets/hitboxes_ui.json)
//   POCKETCAM_SIM       set to force simulators even on a Pi
//   POCKETCAM_SCRIPT    scripted input file for desktop runs

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use log::{info, warn};

use pocket_cam::app::{App, AppParts, FrameOutcome};
use pocket_cam::board::InputEvent;
use pocket_cam::config::{self, Config, ConfigStore};
use pocket_cam::display::{DisplaySink, LOGICAL_H, LOGICAL_W, SnapshotSink};
use pocket_cam::drivers::EventSource;
use pocket_cam::drivers::backlight::{Backlight, SimBacklight};
use pocket_cam::drivers::camera::{CameraBackend, TestPatternCamera};
use pocket_cam::drivers::flash::{Flash, SimFlash};
use pocket_cam::drivers::haptic::{Haptic, SimHaptic};
use pocket_cam::drivers::script::ScriptedInput;
use pocket_cam::drivers::sensor::{SensorSlot, SensorSources, SensorThread};
use pocket_cam::drivers::shutdown::{DryRunShutdown, ShutdownInvoker};
use pocket_cam::drivers::storage::{ImageLoader, PhotoStore};
use pocket_cam::scenes::Services;
use pocket_cam::ui::HitboxEngine;

const HITBOX_ENV: &str = "POCKETCAM_HITBOXES";
const SIM_ENV: &str = "POCKETCAM_SIM";
const SCRIPT_ENV: &str = "POCKETCAM_SCRIPT";
const DEFAULT_HITBOXES: &str = "assets/hitboxes_ui.json";

const POLL_SLICE: Duration = Duration::from_millis(2);
const SNAPSHOT_EVERY: Duration = Duration::from_secs(1);

/// The device-specific half of AppParts.
struct Hardware {
    camera: Box<dyn CameraBackend>,
    flash: Box<dyn Flash>,
    haptic: Box<dyn Haptic>,
    backlight: Box<dyn Backlight>,
    sink: Box<dyn DisplaySink>,
    shutdown: Box<dyn ShutdownInvoker>,
    sensors: SensorSources,
    inputs: Vec<Box<dyn EventSource>>,
}

fn simulated(cfg: &Config) -> Hardware {
    let cam = &cfg.camera;
    let snapshot = config::default_data_dir().join("screen.png");
    info!("sim: frames go to {}", snapshot.display());
    Hardware {
        camera: Box::new(TestPatternCamera::new(
            (cam.preview_width, cam.preview_height),
            (cam.capture_width, cam.capture_height),
        )),
        flash: Box::new(SimFlash::new()),
        haptic: Box::new(SimHaptic::new()),
        backlight: Box::new(SimBacklight::new()),
        sink: Box::new(SnapshotSink::new(snapshot, SNAPSHOT_EVERY)),
        shutdown: Box::new(DryRunShutdown::new()),
        sensors: SensorSources::default(),
        inputs: Vec::new(),
    }
}

#[cfg(target_os = "linux")]
fn hardware(cfg: &Config, now: Instant) -> Option<Hardware> {
    use std::path::Path;

    use pocket_cam::board::{
        FRAMEBUFFER_DEV, FUEL_GAUGE_ADDR, GYRO_ADDR, HAPTIC_ADDR, LIGHT_ADDR, PiBoard,
    };
    use pocket_cam::drivers::backlight::SysfsBacklight;
    use pocket_cam::drivers::battery::Max17043;
    use pocket_cam::drivers::camera::StillCommandCamera;
    use pocket_cam::drivers::encoder::Encoder;
    use pocket_cam::drivers::flash::FlashLed;
    use pocket_cam::drivers::framebuffer::FbdevSink;
    use pocket_cam::drivers::haptic::{Drv2605, NoHaptic};
    use pocket_cam::drivers::input::BodyControls;
    use pocket_cam::drivers::light::Bh1750;
    use pocket_cam::drivers::motion::L3g4200d;
    use pocket_cam::drivers::shutdown::SystemShutdown;

    let board = match PiBoard::open() {
        Ok(b) => b,
        Err(e) => {
            info!("board: no camera body GPIO ({}), using simulators", e);
            return None;
        }
    };

    let mut inputs: Vec<Box<dyn EventSource>> = Vec::new();
    match Encoder::new(board.encoder_a, board.encoder_b) {
        Ok(enc) => inputs.push(Box::new(BodyControls::new(
            enc,
            board.encoder_push,
            board.shutter,
            now,
        ))),
        Err(e) => warn!("board: encoder: {}", e),
    }
    inputs.push(Box::new(pocket_cam::drivers::evdev::EvdevInput::open_all()));

    let sink: Box<dyn DisplaySink> = match FbdevSink::open(Path::new(FRAMEBUFFER_DEV)) {
        Ok(fb) => Box::new(fb),
        Err(e) => {
            warn!("display: {}: {}, writing snapshots", FRAMEBUFFER_DEV, e);
            Box::new(SnapshotSink::new(
                config::default_data_dir().join("screen.png"),
                SNAPSHOT_EVERY,
            ))
        }
    };

    let backlight: Box<dyn Backlight> = match SysfsBacklight::detect() {
        Some(bl) => Box::new(bl),
        None => {
            warn!("backlight: none found");
            Box::new(SimBacklight::new())
        }
    };

    let max_on = Duration::from_millis(cfg.flash.max_on_ms);
    let flash: Box<dyn Flash> = match PiBoard::flash_pin().and_then(|pin| FlashLed::new(pin, max_on)) {
        Ok(led) => Box::new(led),
        Err(e) => {
            warn!("flash: {}", e);
            Box::new(SimFlash::new())
        }
    };

    let haptic: Box<dyn Haptic> = match PiBoard::open_i2c().and_then(|i2c| Drv2605::new(i2c, HAPTIC_ADDR)) {
        Ok(h) => Box::new(h),
        Err(e) => {
            warn!("haptic: {}", e);
            Box::new(NoHaptic)
        }
    };

    let mut sensors = SensorSources::default();
    match PiBoard::open_i2c().and_then(|i2c| L3g4200d::new(i2c, GYRO_ADDR)) {
        Ok(mut gyro) => {
            if let Err(e) = gyro.calibrate(50, Duration::from_millis(10)) {
                warn!("motion: calibration: {}", e);
            }
            sensors.gyro = Some(Box::new(gyro));
        }
        Err(e) => warn!("motion: {}", e),
    }
    match PiBoard::open_i2c().and_then(|i2c| Bh1750::new(i2c, LIGHT_ADDR)) {
        Ok(light) => sensors.light = Some(Box::new(light)),
        Err(e) => warn!("light: {}", e),
    }
    match PiBoard::open_i2c() {
        Ok(i2c) => sensors.battery = Some(Box::new(Max17043::new(i2c, FUEL_GAUGE_ADDR))),
        Err(e) => warn!("battery: {}", e),
    }

    let cam = &cfg.camera;
    Some(Hardware {
        camera: Box::new(StillCommandCamera::new(cam.capture_width, cam.capture_height)),
        flash,
        haptic,
        backlight,
        sink,
        shutdown: Box::new(SystemShutdown::new(cfg.power.shutdown_command.clone())),
        sensors,
        inputs,
    })
}

#[cfg(not(target_os = "linux"))]
fn hardware(_cfg: &Config, _now: Instant) -> Option<Hardware> {
    None
}

#[cfg(target_os = "linux")]
fn quit_flag() -> anyhow::Result<Arc<AtomicBool>> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&flag)).context("registering SIGINT")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&flag)).context("registering SIGTERM")?;
    Ok(flag)
}

#[cfg(not(target_os = "linux"))]
fn quit_flag() -> anyhow::Result<Arc<AtomicBool>> {
    Ok(Arc::new(AtomicBool::new(false)))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("pocket-cam {} starting", env!("CARGO_PKG_VERSION"));

    let mut store = ConfigStore::new(config::default_config_path());
    let cfg = store.load();

    let hitbox_path = std::env::var_os(HITBOX_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HITBOXES));
    let hitboxes = HitboxEngine::load(&hitbox_path)
        .with_context(|| format!("loading hitboxes from {}", hitbox_path.display()))?;

    let now = Instant::now();
    let mut hw = if std::env::var_os(SIM_ENV).is_some() {
        info!("sim: forced by {}", SIM_ENV);
        simulated(&cfg)
    } else {
        hardware(&cfg, now).unwrap_or_else(|| simulated(&cfg))
    };

    if let Some(path) = std::env::var_os(SCRIPT_ENV).map(PathBuf::from) {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading script {}", path.display()))?;
        let script = ScriptedInput::parse(&text).with_context(|| format!("in {}", path.display()))?;
        info!("sim: {} scripted events from {}", script.remaining(), path.display());
        hw.inputs.push(Box::new(script));
    }

    let slot = Arc::new(SensorSlot::new());
    let sensor_thread = if hw.sensors.is_empty() {
        None
    } else {
        Some(SensorThread::spawn(hw.sensors, Arc::clone(&slot)).context("starting sensor thread")?)
    };

    let photos = PhotoStore::new(cfg.storage.photos_dir.clone());
    if let Err(e) = photos.ensure_dir() {
        warn!("storage: {}: {}", photos.dir().display(), e);
    }
    let services = Services {
        camera: hw.camera,
        flash: hw.flash,
        photos,
        loader: Box::new(ImageLoader::new(LOGICAL_W as u32, LOGICAL_H as u32)),
        haptic: hw.haptic,
        config: cfg,
    };

    let mut app = App::new(
        AppParts {
            services,
            store: Some(store),
            hitboxes,
            backlight: hw.backlight,
            sink: hw.sink,
            shutdown: hw.shutdown,
            sensor_slot: slot,
            sensor_thread,
        },
        now,
    );
    let quit = quit_flag()?;
    let mut inputs = hw.inputs;
    let mut events = Vec::new();
    info!("app: ready, {} input sources", inputs.len());

    loop {
        let frame_start = Instant::now();
        poll_all(&mut inputs, frame_start, &mut events);
        if quit.load(Ordering::Relaxed) {
            events.push(InputEvent::Quit);
        }

        match app.run_frame(frame_start, &events) {
            FrameOutcome::Continue => {}
            FrameOutcome::Quit => {
                info!("app: quit requested");
                app.close();
                return Ok(());
            }
            FrameOutcome::PoweredOff(report) => {
                if !report.powered_off {
                    warn!("app: power off did not complete, exiting anyway");
                }
                return Ok(());
            }
        }
        events.clear();

        let deadline = frame_start + app.frame_interval();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            poll_all(&mut inputs, now, &mut events);
            thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }
}

fn poll_all(inputs: &mut [Box<dyn EventSource>], now: Instant, out: &mut Vec<InputEvent>) {
    for source in inputs.iter_mut() {
        source.poll(now, out);
    }
}
