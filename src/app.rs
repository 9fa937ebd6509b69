// Application loop
//
// One call to run_frame per frame, with the input gathered since the
// last one:
//
//   input -> power activity -> rotate touch -> hitbox / gesture -> scene
//   power tick -> shutdown? -> scene update -> render -> rotate -> present
//
// Every event updates the power manager before it is dispatched. A
// touch that wakes the device is dispatched too; anything else that
// arrives in standby is dropped. Nothing is rendered in standby.
//
// The frame loop itself (sleeping until the next deadline, polling
// the drivers) lives in the binary so tests can drive frames with
// synthetic time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use crate::board::{Action, InputEvent};
use crate::config::{ConfigError, ConfigStore};
use crate::display::{DisplaySink, Framebuffer, LOGICAL_H, LOGICAL_W, PhysicalFrame, Rotation};
use crate::drivers::HwError;
use crate::drivers::backlight::Backlight;
use crate::drivers::sensor::{SensorReading, SensorSlot, SensorThread};
use crate::drivers::shutdown::{ShutdownError, ShutdownInvoker};
use crate::kernel::health::HEALTH_INTERVAL;
use crate::kernel::shutdown::{self, ShutdownPlan, ShutdownReport, ShutdownSteps};
use crate::kernel::{FramePacer, HealthSnapshot, HealthWriter, PowerManager, PowerTimings};
use crate::scenes::boot::BootScene;
use crate::scenes::camera::CameraScene;
use crate::scenes::gallery::GalleryScene;
use crate::scenes::settings::SettingsScene;
use crate::scenes::{SceneContext, SceneEvent, SceneId, SceneRegistry, Services};
use crate::ui::overlay;
use crate::ui::{Alignment, GestureDetector, HEADING_FONT, HitboxEngine, Label, Region};

/// Everything the app is built from; the binary picks real hardware
/// or simulators for each piece.
pub struct AppParts {
    pub services: Services,
    /// Where config changes are persisted; None keeps them in memory.
    pub store: Option<ConfigStore>,
    pub hitboxes: HitboxEngine,
    pub backlight: Box<dyn Backlight>,
    pub sink: Box<dyn DisplaySink>,
    pub shutdown: Box<dyn ShutdownInvoker>,
    pub sensor_slot: Arc<SensorSlot>,
    pub sensor_thread: Option<SensorThread>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// Close requested (signal or `Quit` input); call `close`.
    Quit,
    /// The shutdown sequence ran; the process should exit.
    PoweredOff(ShutdownReport),
}

/// Routing state for input on its way to the scenes.
struct Dispatch {
    registry: SceneRegistry,
    hitboxes: HitboxEngine,
    gestures: GestureDetector,
    rotation: Rotation,
    last_tap: Option<(u16, u16)>,
}

impl Dispatch {
    fn route(&mut self, ev: InputEvent, now: Instant, ctx: &mut SceneContext<'_>) {
        let scene_ev = match ev {
            InputEvent::TouchDown { x, y } => {
                let (lx, ly) = self.rotation.to_logical(x, y, LOGICAL_W, LOGICAL_H);
                self.gestures.touch_down(lx, ly, now);
                self.last_tap = Some((lx, ly));
                let scene = self.registry.current();
                match self.hitboxes.hit_test(scene, lx, ly) {
                    Some(hit) => {
                        log::debug!("input: {} hit {} ({})", scene, hit.id, hit.action);
                        match nav_target(hit.action) {
                            Some(to) => {
                                self.registry.goto(to, ctx);
                                return;
                            }
                            None => SceneEvent::Action(hit.action),
                        }
                    }
                    None => SceneEvent::Touch { x: lx, y: ly },
                }
            }
            InputEvent::TouchUp { x, y } => {
                let (lx, ly) = self.rotation.to_logical(x, y, LOGICAL_W, LOGICAL_H);
                match self.gestures.touch_up(lx, ly, now) {
                    Some(g) => SceneEvent::Gesture(g),
                    None => return,
                }
            }
            InputEvent::Key(k) => SceneEvent::Key(k),
            InputEvent::EncoderTurn(d) => SceneEvent::Encoder(d),
            InputEvent::ButtonDown(b) => SceneEvent::ButtonDown(b),
            InputEvent::ButtonUp(b) => SceneEvent::ButtonUp(b),
            InputEvent::Quit => return,
        };
        self.registry.handle_event(scene_ev, ctx);
    }
}

fn nav_target(action: Action) -> Option<SceneId> {
    match action {
        Action::GoToSettings => Some(SceneId::Settings),
        Action::GoToGallery => Some(SceneId::Gallery),
        Action::GoToMain => Some(SceneId::Camera),
        Action::CycleFlash | Action::DeletePhoto | Action::Capture => None,
    }
}

pub struct App {
    services: Services,
    store: Option<ConfigStore>,
    ui: Dispatch,
    power: PowerManager,
    pacer: FramePacer,
    health: Option<HealthWriter>,
    fb: Framebuffer,
    phys: PhysicalFrame,
    sink: Box<dyn DisplaySink>,
    shutdown: Box<dyn ShutdownInvoker>,
    sensor_slot: Arc<SensorSlot>,
    sensor_thread: Option<SensorThread>,
    started: Instant,
    closed: bool,
}

impl App {
    pub fn new(parts: AppParts, now: Instant) -> Self {
        let AppParts {
            mut services,
            store,
            hitboxes,
            backlight,
            sink,
            shutdown,
            sensor_slot,
            sensor_thread,
        } = parts;

        let cfg = &services.config;
        let rotation = cfg.display.rotation();
        let level = cfg.display.brightness_level(sensor_slot.snapshot().lux);
        let timings = PowerTimings::from_secs(cfg.power.standby_timeout_s, cfg.power.shutdown_long_press_s);
        let power = PowerManager::new(backlight, level, timings, cfg.power.motion_keeps_awake, now);
        let pacer = FramePacer::new(cfg.camera.preview_fps as u32);
        let health = cfg
            .storage
            .health_file
            .clone()
            .map(|p| HealthWriter::new(p, HEALTH_INTERVAL));
        log::info!("app: rotation {} deg, {} hitboxes", rotation.degrees(), hitboxes.len());

        let mut registry = SceneRegistry::new();
        {
            let mut ctx = SceneContext::new(&mut services, sensor_slot.snapshot(), now);
            registry.register(Box::new(BootScene::new()), &mut ctx);
            registry.register(Box::new(CameraScene::new()), &mut ctx);
            registry.register(Box::new(SettingsScene::new()), &mut ctx);
            registry.register(Box::new(GalleryScene::new()), &mut ctx);
            registry.start(SceneId::Boot, &mut ctx);
        }

        Self {
            services,
            store,
            ui: Dispatch {
                registry,
                hitboxes,
                gestures: GestureDetector::new(),
                rotation,
                last_tap: None,
            },
            power,
            pacer,
            health,
            fb: Framebuffer::logical(),
            phys: PhysicalFrame::default(),
            sink,
            shutdown,
            sensor_slot,
            sensor_thread,
            started: now,
            closed: false,
        }
    }

    pub fn power(&self) -> &PowerManager {
        &self.power
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.ui.registry
    }

    pub fn current_scene(&self) -> SceneId {
        self.ui.registry.current()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// How long until the next frame should start.
    pub fn frame_interval(&self) -> Duration {
        self.pacer.interval(self.power.is_standby())
    }

    pub fn run_frame(&mut self, now: Instant, events: &[InputEvent]) -> FrameOutcome {
        // `now` may be synthetic; the work itself is timed on the wall clock
        let work_start = Instant::now();
        let dt = self.pacer.begin(now);
        let sensors = self.sensor_slot.snapshot();
        let mut quit = false;

        let mut ctx = SceneContext::new(&mut self.services, sensors, now);
        for &ev in events {
            if ev == InputEvent::Quit {
                quit = true;
                continue;
            }
            self.power.on_event(&ev, now);
            if self.power.is_active() {
                self.ui.route(ev, now, &mut ctx);
            }
        }

        self.power.note_motion(sensors.moving, now);
        self.power.tick(now);

        if self.power.shutdown_requested() && self.power.begin_shutdown() {
            drop(ctx);
            return FrameOutcome::PoweredOff(self.power_off());
        }
        if quit {
            return FrameOutcome::Quit;
        }

        let active = self.power.is_active();
        if active {
            self.ui.registry.update(dt, &mut ctx);
        } else {
            self.ui.gestures.cancel();
        }
        if active {
            self.ui.registry.render(&mut self.fb, &mut ctx);
        }
        let config_changed = ctx.config_changed();
        drop(ctx);

        if config_changed {
            self.persist_config();
        }
        self.apply_brightness(&sensors);

        if active {
            if self.services.config.ui.touch_debug_overlay {
                let scene = self.ui.registry.current();
                overlay::draw_touch_debug(&mut self.fb, self.ui.hitboxes.hitboxes(scene), self.ui.last_tap).ok();
            }
            self.present();
        }

        if let Some(h) = self.health.as_mut() {
            let snap = || HealthSnapshot {
                timestamp: chrono::Local::now().to_rfc3339(),
                uptime_s: now.saturating_duration_since(self.started).as_secs(),
                fps: self.pacer.fps(),
                frame_ms: self.pacer.frame_time().as_secs_f32() * 1000.0,
                frames: self.pacer.frames(),
                scene: self.ui.registry.current().name(),
                power_state: self.power.state().name(),
                faulted: self.ui.registry.is_faulted(),
                battery_pct: sensors.battery_pct,
            };
            h.maybe_write(now, snap);
        }

        self.pacer.end(work_start.elapsed());
        FrameOutcome::Continue
    }

    /// Clean stop without powering off: sensors, camera, config.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let timeout = secs_or(self.services.config.power.sensor_join_timeout_s, Duration::from_secs(1));
        if let Some(t) = self.sensor_thread.as_mut() {
            t.stop(timeout);
        }
        self.services.camera.cleanup();
        self.services.flash_off();
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.services.config)
        {
            log::warn!("app: saving config: {}", e);
        }
        log::info!("app: closed after {} frames", self.pacer.frames());
    }

    fn persist_config(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&self.services.config) {
            log::warn!("app: saving config: {}", e);
        }
    }

    // Manual modes are fixed levels; auto follows the light meter.
    fn apply_brightness(&mut self, sensors: &SensorReading) {
        let level = self.services.config.display.brightness_level(sensors.lux);
        self.power.set_brightness(level);
    }

    fn present(&mut self) {
        self.fb.rotate_into(self.ui.rotation, &mut self.phys);
        if let Err(e) = self.sink.present(&self.phys) {
            log::warn!("display: present failed: {}", e);
        }
    }

    fn power_off(&mut self) -> ShutdownReport {
        let cfg = &self.services.config.power;
        let plan = ShutdownPlan {
            delay: secs_or(cfg.shutdown_delay_s, ShutdownPlan::default().delay),
            sensor_timeout: secs_or(cfg.sensor_join_timeout_s, ShutdownPlan::default().sensor_timeout),
        };
        self.services.camera.cleanup();
        self.services.flash_off();
        self.closed = true;
        let report = shutdown::execute(&plan, &mut Teardown { app: self });
        log::warn!("app: shutdown finished: {:?}", report);
        report
    }
}

fn secs_or(secs: f64, default: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(default)
}

struct Teardown<'a> {
    app: &'a mut App,
}

impl ShutdownSteps for Teardown<'_> {
    fn show_notice(&mut self) -> Result<(), HwError> {
        let fb = &mut self.app.fb;
        fb.clear(Rgb565::BLACK).ok();
        let mid = fb.height() / 2;
        Label::new(Region::new(0, mid - 15, fb.width(), 30), "Shutting down...", HEADING_FONT)
            .alignment(Alignment::Center)
            .colors(Rgb565::WHITE, Rgb565::BLACK)
            .draw(fb)
            .ok();
        self.app.fb.rotate_into(self.app.ui.rotation, &mut self.app.phys);
        self.app.sink.present(&self.app.phys)
    }

    fn pulse(&mut self) -> Result<(), HwError> {
        let h = &self.app.services.config.haptic;
        if !h.enabled {
            return Ok(());
        }
        let effect = h.confirm;
        self.app.services.haptic.pulse(effect)
    }

    fn hold(&mut self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn stop_sensors(&mut self, timeout: Duration) -> bool {
        match self.app.sensor_thread.as_mut() {
            Some(t) => t.stop(timeout),
            None => true,
        }
    }

    fn save_config(&mut self) -> Result<(), ConfigError> {
        match &self.app.store {
            Some(store) => store.save(&self.app.services.config),
            None => Ok(()),
        }
    }

    fn power_off(&mut self) -> Result<(), ShutdownError> {
        self.app.shutdown.power_off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Button, Key};
    use crate::display::HeadlessSink;
    use crate::drivers::backlight::SimBacklight;
    use crate::drivers::haptic::SimHaptic;
    use crate::drivers::shutdown::DryRunShutdown;
    use crate::kernel::PowerState;
    use crate::ui::Hitbox;

    struct Rig {
        _dir: tempfile::TempDir,
        app: App,
        backlight: SimBacklight,
        off: DryRunShutdown,
        t0: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut cfg = crate::config::Config::default();
            cfg.storage.photos_dir = dir.path().join("photos");
            cfg.storage.health_file = None;
            cfg.power.shutdown_delay_s = 0.0;
            cfg.camera.preview_width = 32;
            cfg.camera.preview_height = 24;
            cfg.camera.capture_width = 32;
            cfg.camera.capture_height = 24;
            let mut hitboxes = HitboxEngine::new();
            hitboxes.register(
                SceneId::Camera,
                Hitbox::new("settings_btn", Region::new(400, 16, 64, 64), Action::GoToSettings),
            );
            hitboxes.register(
                SceneId::Settings,
                Hitbox::new("back_btn", Region::new(16, 16, 96, 56), Action::GoToMain),
            );

            let backlight = SimBacklight::new();
            let off = DryRunShutdown::new();
            let t0 = Instant::now();
            let parts = AppParts {
                services: Services::simulated_with(cfg, SimHaptic::new()),
                store: Some(ConfigStore::new(dir.path().join("config.json"))),
                hitboxes,
                backlight: Box::new(backlight.clone()),
                sink: Box::new(HeadlessSink::new()),
                shutdown: Box::new(off.clone()),
                sensor_slot: Arc::new(SensorSlot::new()),
                sensor_thread: None,
            };
            Self {
                app: App::new(parts, t0),
                _dir: dir,
                backlight,
                off,
                t0,
            }
        }

        fn frame(&mut self, ms: u64, events: &[InputEvent]) -> FrameOutcome {
            self.app.run_frame(self.t0 + Duration::from_millis(ms), events)
        }

        // physical point that lands on logical (lx, ly)
        fn touch(&self, lx: u16, ly: u16) -> (u16, u16) {
            self.app.ui.rotation.to_physical(lx, ly, LOGICAL_W, LOGICAL_H)
        }
    }

    #[test]
    fn boot_hands_over_to_camera() {
        let mut rig = Rig::new();
        rig.frame(0, &[]);
        assert_eq!(rig.app.current_scene(), SceneId::Boot);
        rig.frame(1500, &[]);
        assert_eq!(rig.app.current_scene(), SceneId::Camera);
    }

    #[test]
    fn frame_time_ignores_a_synthetic_clock() {
        let mut rig = Rig::new();
        let Some(past) = rig.t0.checked_sub(Duration::from_secs(30)) else {
            return;
        };
        rig.app.run_frame(past, &[]);
        assert!(rig.app.pacer().frame_time() < Duration::from_secs(5));
    }

    #[test]
    fn rotated_touch_hits_the_settings_button() {
        let mut rig = Rig::new();
        rig.frame(1500, &[]);
        let (px, py) = rig.touch(420, 40);
        rig.frame(1600, &[InputEvent::TouchDown { x: px, y: py }]);
        assert_eq!(rig.app.current_scene(), SceneId::Settings);

        let (px, py) = rig.touch(30, 30);
        rig.frame(1700, &[InputEvent::TouchDown { x: px, y: py }]);
        assert_eq!(rig.app.current_scene(), SceneId::Camera);
        assert_eq!(rig.app.registry().history().len(), 3);
    }

    #[test]
    fn waking_touch_is_dispatched_too() {
        let mut rig = Rig::new();
        rig.frame(1500, &[]);
        rig.frame(40_000, &[]);
        assert!(rig.app.power().is_standby());
        assert_eq!(rig.backlight.current(), Some(0));

        let (px, py) = rig.touch(420, 40);
        rig.frame(40_100, &[InputEvent::TouchDown { x: px, y: py }]);
        assert!(rig.app.power().is_active());
        assert_eq!(rig.app.current_scene(), SceneId::Settings);
    }

    #[test]
    fn settings_change_is_saved() {
        let mut rig = Rig::new();
        rig.frame(1500, &[]);
        rig.frame(1600, &[InputEvent::Key(Key::Char('g'))]);
        let mut store = rig.app.store.clone().unwrap();
        assert!(store.load().ui.grid_enabled);
    }

    #[test]
    fn long_press_runs_the_shutdown_sequence() {
        let mut rig = Rig::new();
        rig.frame(1500, &[]);
        rig.frame(2000, &[InputEvent::ButtonDown(Button::EncoderPush)]);
        assert_eq!(rig.frame(3000, &[]), FrameOutcome::Continue);
        match rig.frame(3900, &[]) {
            FrameOutcome::PoweredOff(report) => {
                assert!(report.notice_shown);
                assert!(report.sensors_stopped);
                assert!(report.config_saved);
                assert!(report.powered_off);
            }
            other => panic!("expected power off, got {:?}", other),
        }
        assert_eq!(rig.app.power().state(), PowerState::ShutdownInProgress);
        assert_eq!(rig.off.calls(), 1);
    }

    #[test]
    fn quit_closes_without_power_off() {
        let mut rig = Rig::new();
        assert_eq!(rig.frame(0, &[InputEvent::Quit]), FrameOutcome::Quit);
        rig.app.close();
        rig.app.close();
        assert_eq!(rig.off.calls(), 0);
    }
}
