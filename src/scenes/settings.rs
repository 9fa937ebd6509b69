// Settings list, edited in place on the live config.
//
// Encoder turns move the selection; a push toggles edit mode, in which
// turns step the selected value instead. Touching a row selects it and
// advances its value. Every change marks the config for saving and the
// app reapplies brightness straight away.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::PrimitiveStyle;

use super::{Feedback, Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::board::{Button, Key};
use crate::config::{BrightnessMode, Config, FlashMode, InfoDisplay};
use crate::display::Framebuffer;
use crate::ui::{
    ACCENT, Alignment, BODY_FONT, DIM, HEADING_FONT, Label, PANEL, Region, wrap_next, wrap_prev,
    wrap_step,
};

const ROWS_TOP: u16 = 100;
const ROW_STRIDE: u16 = 60;
const ROW_H: u16 = 52;
const LABEL_X: u16 = 16;
const LABEL_W: u16 = 200;
const VALUE_X: u16 = LABEL_X + LABEL_W + 8;
const VALUE_W: u16 = 240;

pub const BACK_BTN: Region = Region::new(16, 16, 96, 56);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Brightness,
    Flash,
    Grid,
    Level,
    Info,
}

impl Item {
    pub const ALL: [Item; 5] = [Item::Brightness, Item::Flash, Item::Grid, Item::Level, Item::Info];

    pub const fn label(self) -> &'static str {
        match self {
            Item::Brightness => "Brightness",
            Item::Flash => "Flash",
            Item::Grid => "Grid",
            Item::Level => "Level",
            Item::Info => "Info display",
        }
    }

    pub fn value(self, cfg: &Config) -> &'static str {
        let on_off = |b: bool| if b { "On" } else { "Off" };
        match self {
            Item::Brightness => cfg.display.brightness_mode.label(),
            Item::Flash => cfg.flash.mode.label(),
            Item::Grid => on_off(cfg.ui.grid_enabled),
            Item::Level => on_off(cfg.ui.level_enabled),
            Item::Info => cfg.ui.info_display.label(),
        }
    }

    /// Steps the value by `delta`, wrapping. Booleans flip on any step.
    pub fn step(self, cfg: &mut Config, delta: i32) {
        if delta == 0 {
            return;
        }
        match self {
            Item::Brightness => {
                let modes = BrightnessMode::ALL;
                let cur = modes
                    .iter()
                    .position(|m| *m == cfg.display.brightness_mode)
                    .unwrap_or(0);
                cfg.display.brightness_mode = modes[wrap_step(cur, delta, modes.len())];
            }
            Item::Flash => {
                let modes = FlashMode::ALL;
                let cur = modes.iter().position(|m| *m == cfg.flash.mode).unwrap_or(0);
                cfg.flash.mode = modes[wrap_step(cur, delta, modes.len())];
            }
            Item::Grid => cfg.ui.grid_enabled = !cfg.ui.grid_enabled,
            Item::Level => cfg.ui.level_enabled = !cfg.ui.level_enabled,
            Item::Info => {
                cfg.ui.info_display = match cfg.ui.info_display {
                    InfoDisplay::Off => InfoDisplay::Minimal,
                    InfoDisplay::Minimal => InfoDisplay::Off,
                }
            }
        }
    }
}

#[inline]
fn row_region(i: usize) -> Region {
    Region::new(LABEL_X, ROWS_TOP + i as u16 * ROW_STRIDE, LABEL_W + 8 + VALUE_W, ROW_H)
}

fn row_at(x: u16, y: u16) -> Option<usize> {
    (0..Item::ALL.len()).find(|&i| row_region(i).contains(x, y))
}

#[derive(Default)]
pub struct SettingsScene {
    selected: usize,
    editing: bool,
}

impl SettingsScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Item {
        Item::ALL[self.selected]
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    fn change(&mut self, delta: i32, ctx: &mut SceneContext<'_>) {
        let item = self.selected();
        item.step(&mut ctx.services.config, delta);
        log::info!("settings: {} = {}", item.label(), item.value(ctx.config()));
        ctx.pulse(Feedback::Tick);
        ctx.mark_config_changed();
    }

    fn move_selection(&mut self, delta: i32, ctx: &mut SceneContext<'_>) {
        let old = self.selected;
        self.selected = match delta {
            1 => wrap_next(self.selected, Item::ALL.len()),
            -1 => wrap_prev(self.selected, Item::ALL.len()),
            d => wrap_step(self.selected, d, Item::ALL.len()),
        };
        if self.selected != old {
            ctx.pulse(Feedback::Tick);
        }
    }
}

impl Scene for SettingsScene {
    fn id(&self) -> SceneId {
        SceneId::Settings
    }

    fn on_enter(&mut self, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.selected = 0;
        self.editing = false;
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: SceneEvent,
        ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError> {
        match event {
            SceneEvent::Key(Key::Escape) => return Ok(Transition::Goto(SceneId::Camera)),

            SceneEvent::Encoder(d) if self.editing => self.change(d as i32, ctx),
            SceneEvent::Encoder(d) => self.move_selection(d as i32, ctx),
            SceneEvent::ButtonDown(Button::EncoderPush) => {
                self.editing = !self.editing;
                ctx.pulse(Feedback::Confirm);
            }

            SceneEvent::Key(Key::Up) => self.move_selection(-1, ctx),
            SceneEvent::Key(Key::Down) => self.move_selection(1, ctx),
            SceneEvent::Key(Key::Left) => self.change(-1, ctx),
            SceneEvent::Key(Key::Right) | SceneEvent::Key(Key::Enter) => self.change(1, ctx),

            SceneEvent::Touch { x, y } => {
                if let Some(i) = row_at(x, y) {
                    self.selected = i;
                    self.editing = false;
                    self.change(1, ctx);
                }
            }
            _ => {}
        }
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let w = fb.width();
        fb.clear(Rgb565::BLACK).ok();

        Label::new(BACK_BTN, "< Back", BODY_FONT)
            .alignment(Alignment::Center)
            .colors(Rgb565::WHITE, PANEL)
            .draw(fb)
            .ok();
        Label::new(Region::new(0, 30, w, 30), "Settings", HEADING_FONT)
            .alignment(Alignment::Center)
            .colors(ACCENT, Rgb565::BLACK)
            .draw(fb)
            .ok();

        for (i, item) in Item::ALL.into_iter().enumerate() {
            let row = row_region(i);
            let selected = i == self.selected;
            let bg = if selected { PANEL } else { Rgb565::BLACK };
            row.to_rect()
                .into_styled(PrimitiveStyle::with_fill(bg))
                .draw(fb)
                .ok();
            if selected {
                row.to_rect()
                    .into_styled(PrimitiveStyle::with_stroke(ACCENT, 2))
                    .draw(fb)
                    .ok();
            }

            Label::new(Region::new(LABEL_X + 8, row.y, LABEL_W - 8, ROW_H), item.label(), BODY_FONT)
                .alignment(Alignment::CenterLeft)
                .colors(Rgb565::WHITE, bg)
                .draw(fb)
                .ok();

            let value_fg = if selected && self.editing { ACCENT } else { DIM };
            Label::new(Region::new(VALUE_X, row.y, VALUE_W, ROW_H), item.value(ctx.config()), BODY_FONT)
                .alignment(Alignment::CenterRight)
                .colors(value_fg, bg)
                .draw(fb)
                .ok();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sensor::SensorReading;
    use crate::scenes::Services;
    use std::time::Instant;

    fn services() -> (tempfile::TempDir, Services) {
        let dir = tempfile::tempdir().unwrap();
        let s = Services::simulated(dir.path());
        (dir, s)
    }

    #[test]
    fn brightness_cycles_through_every_mode() {
        let mut cfg = Config::default();
        let start = cfg.display.brightness_mode;
        let mut seen = vec![start];
        for _ in 0..3 {
            Item::Brightness.step(&mut cfg, 1);
            seen.push(cfg.display.brightness_mode);
        }
        Item::Brightness.step(&mut cfg, 1);
        assert_eq!(cfg.display.brightness_mode, start);
        seen.sort_by_key(|m| m.label());
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn flash_steps_backwards_with_wrap() {
        let mut cfg = Config::default();
        cfg.flash.mode = FlashMode::Off;
        Item::Flash.step(&mut cfg, -1);
        assert_eq!(cfg.flash.mode, FlashMode::Auto);
    }

    #[test]
    fn encoder_moves_then_edits() {
        let (_dir, mut s) = services();
        let mut scene = SettingsScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        scene.on_enter(&mut ctx).unwrap();

        scene.handle_event(SceneEvent::Encoder(2), &mut ctx).unwrap();
        assert_eq!(scene.selected(), Item::Grid);
        assert!(!ctx.config_changed());

        scene
            .handle_event(SceneEvent::ButtonDown(Button::EncoderPush), &mut ctx)
            .unwrap();
        assert!(scene.is_editing());
        scene.handle_event(SceneEvent::Encoder(1), &mut ctx).unwrap();
        assert!(ctx.config_changed());
        assert!(ctx.config().ui.grid_enabled);
    }

    #[test]
    fn touching_a_row_selects_and_advances() {
        let (_dir, mut s) = services();
        let mut scene = SettingsScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        let before = ctx.config().ui.info_display;

        // info display is the fifth row
        let r = row_region(4);
        scene
            .handle_event(SceneEvent::Touch { x: r.x + 10, y: r.y + 10 }, &mut ctx)
            .unwrap();
        assert_eq!(scene.selected(), Item::Info);
        assert_ne!(ctx.config().ui.info_display, before);

        // between rows is dead space
        let gap_y = r.y + ROW_H + 2;
        let t = scene
            .handle_event(SceneEvent::Touch { x: r.x + 10, y: gap_y }, &mut ctx)
            .unwrap();
        assert_eq!(t, Transition::None);
    }

    #[test]
    fn escape_returns_to_camera() {
        let (_dir, mut s) = services();
        let mut scene = SettingsScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        assert_eq!(
            scene.handle_event(SceneEvent::Key(Key::Escape), &mut ctx).unwrap(),
            Transition::Goto(SceneId::Camera)
        );
    }
}
