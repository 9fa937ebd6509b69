// Viewfinder: live preview, zoom on the encoder, capture on the
// shutter. Overlays (grid, level, info bar) follow the ui config.
//
// Zoom is a digital crop of the preview. The encoder moves a target
// and the shown zoom eases toward it each update.

use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle};

use super::{Feedback, Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::board::{Action, Button, Key};
use crate::config::InfoDisplay;
use crate::display::{Bitmap, Framebuffer};
use crate::ui::overlay::{self, InfoBar};
use crate::ui::{ACCENT, Alignment, BODY_FONT, DIM, Label, PANEL, Region, SMALL_FONT};

pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 2.5;
pub const ZOOM_STEP: f32 = 0.05;
const ZOOM_SMOOTHING: f32 = 0.25;
// LED rise time before the sensor starts exposing
const FLASH_SETTLE: Duration = Duration::from_millis(50);

// on-screen controls; the hitbox file uses the same rectangles
pub const FLASH_BTN: Region = Region::new(16, 16, 64, 64);
pub const SETTINGS_BTN: Region = Region::new(400, 16, 64, 64);
pub const GALLERY_BTN: Region = Region::new(16, 720, 96, 64);
pub const SHUTTER_BTN: Region = Region::new(190, 690, 100, 100);
const INFO_BOTTOM: u16 = 680;

pub struct CameraScene {
    frame: Option<Bitmap>,
    zoom: f32,
    target_zoom: f32,
    frozen_until: Option<Instant>,
    preview_ok: bool,
    captures: u32,
}

impl Default for CameraScene {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraScene {
    pub fn new() -> Self {
        Self {
            frame: None,
            zoom: ZOOM_MIN,
            target_zoom: ZOOM_MIN,
            frozen_until: None,
            preview_ok: false,
            captures: 0,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn target_zoom(&self) -> f32 {
        self.target_zoom
    }

    pub fn captures(&self) -> u32 {
        self.captures
    }

    fn frozen(&self, now: Instant) -> bool {
        self.frozen_until.is_some_and(|t| now < t)
    }

    fn step_zoom(&mut self, detents: i8) {
        self.target_zoom =
            (self.target_zoom + detents as f32 * ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    fn capture(&mut self, ctx: &mut SceneContext<'_>) {
        let s = &mut *ctx.services;
        let fire = s.config.flash.should_fire(ctx.sensors.lux);
        log::info!(
            "camera: capture, flash {} ({})",
            if fire { "fired" } else { "off" },
            s.config.flash.mode.label()
        );

        let path = match s.photos.ensure_dir().and_then(|_| s.photos.next_path(chrono::Local::now())) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("camera: no photo path: {}", e);
                s.pulse(Feedback::Error);
                return;
            }
        };

        if fire {
            match s.flash.on() {
                Ok(()) => std::thread::sleep(FLASH_SETTLE),
                Err(e) => log::warn!("camera: flash: {}", e),
            }
        }
        let quality = s.config.camera.capture_quality;
        let result = s.camera.capture_photo(&path, quality);
        if fire {
            s.flash_off();
        }

        match result {
            Ok(()) => {
                log::info!("camera: saved {}", path.display());
                self.captures += 1;
                s.pulse(Feedback::Capture);
                let freeze = Duration::from_millis(s.config.ui.freeze_duration_ms);
                if !freeze.is_zero() {
                    self.frozen_until = Some(ctx.now + freeze);
                }
                let max = s.config.storage.max_photos;
                if let Err(e) = s.photos.enforce_limit(max) {
                    log::warn!("camera: photo limit: {}", e);
                }
            }
            Err(e) => {
                log::warn!("camera: capture failed: {}", e);
                s.pulse(Feedback::Error);
            }
        }
    }

    fn draw_controls(&self, fb: &mut Framebuffer, ctx: &SceneContext<'_>) {
        let flash = ctx.config().flash.mode.label();
        for (region, text) in [(FLASH_BTN, flash), (SETTINGS_BTN, "SET"), (GALLERY_BTN, "PHOTOS")] {
            Label::new(region, text, SMALL_FONT)
                .alignment(Alignment::Center)
                .colors(Rgb565::WHITE, PANEL)
                .draw(fb)
                .ok();
        }
        let c = SHUTTER_BTN;
        let center = Point::new((c.x + c.w / 2) as i32, (c.y + c.h / 2) as i32);
        Circle::with_center(center, (c.w - 16) as u32)
            .into_styled(PrimitiveStyle::with_fill(Rgb565::WHITE))
            .draw(fb)
            .ok();
        Circle::with_center(center, (c.w - 4) as u32)
            .into_styled(PrimitiveStyle::with_stroke(ACCENT, 3))
            .draw(fb)
            .ok();
    }
}

impl Scene for CameraScene {
    fn id(&self) -> SceneId {
        SceneId::Camera
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.frozen_until = None;
        self.preview_ok = match ctx.services.camera.start_preview() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("camera: preview unavailable: {}", e);
                false
            }
        };
        log::info!("camera: preview via {}", ctx.services.camera.name());
        Ok(())
    }

    fn on_exit(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.frame = None;
        ctx.services.camera.stop_preview()?;
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: SceneEvent,
        ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError> {
        match event {
            SceneEvent::Encoder(d) => {
                let before = self.target_zoom;
                self.step_zoom(d);
                if self.target_zoom != before {
                    ctx.pulse(Feedback::Tick);
                }
            }
            SceneEvent::ButtonDown(Button::Shutter)
            | SceneEvent::Action(Action::Capture)
            | SceneEvent::Key(Key::Char('s')) => self.capture(ctx),
            SceneEvent::Key(Key::Char('g')) => {
                let ui = &mut ctx.services.config.ui;
                ui.grid_enabled = !ui.grid_enabled;
                ctx.mark_config_changed();
            }
            SceneEvent::Key(Key::Char('l')) => {
                let ui = &mut ctx.services.config.ui;
                ui.level_enabled = !ui.level_enabled;
                ctx.mark_config_changed();
            }
            SceneEvent::Key(Key::Char('f')) | SceneEvent::Action(Action::CycleFlash) => {
                let flash = &mut ctx.services.config.flash;
                flash.mode = flash.mode.next();
                log::info!("camera: flash {}", flash.mode.label());
                ctx.pulse(Feedback::Tick);
                ctx.mark_config_changed();
            }
            SceneEvent::Key(Key::Up) => self.step_zoom(1),
            SceneEvent::Key(Key::Down) => self.step_zoom(-1),
            _ => {}
        }
        Ok(Transition::None)
    }

    fn update(&mut self, _dt: Duration, ctx: &mut SceneContext<'_>) -> Result<Transition, SceneError> {
        let gap = self.target_zoom - self.zoom;
        if gap.abs() < 0.001 {
            self.zoom = self.target_zoom;
        } else {
            self.zoom += gap * ZOOM_SMOOTHING;
        }

        if !self.frozen(ctx.now) {
            self.frozen_until = None;
            if let Some(f) = ctx.services.camera.preview_frame() {
                self.frame = Some(f);
            }
        }
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let w = fb.width();
        let h = fb.height();
        let full = Region::new(0, 0, w, h);
        fb.clear(Rgb565::BLACK).ok();

        match &self.frame {
            Some(frame) => fb.blit_fit(frame, full, self.zoom),
            None => {
                let msg = if self.preview_ok { "Starting preview" } else { "No preview" };
                Label::new(Region::new(0, h / 2 - 12, w, 24), msg, BODY_FONT)
                    .alignment(Alignment::Center)
                    .colors(DIM, Rgb565::BLACK)
                    .draw(fb)
                    .ok();
            }
        }

        let ui = &ctx.config().ui;
        if ui.grid_enabled {
            overlay::draw_grid(fb, full).ok();
        }
        if ui.level_enabled {
            overlay::draw_level(fb, full, ctx.sensors.tilt_deg).ok();
        }
        if ui.info_display == InfoDisplay::Minimal {
            let clock = chrono::Local::now().format("%H:%M").to_string();
            InfoBar {
                battery_pct: ctx.sensors.battery_pct,
                clock: &clock,
                flash: ctx.config().flash.mode,
                zoom: self.zoom,
            }
            .draw(fb, w, INFO_BOTTOM)
            .ok();
        }

        if self.frozen(ctx.now) {
            Label::new(Region::new(0, 100, w, 30), "SAVED", BODY_FONT)
                .alignment(Alignment::Center)
                .colors(Rgb565::BLACK, ACCENT)
                .draw(fb)
                .ok();
        }

        self.draw_controls(fb, ctx);
        Ok(())
    }
}
