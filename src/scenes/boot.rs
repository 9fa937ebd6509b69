// Boot splash: logo and a progress bar, then the camera.
// A tap skips it once the minimum time has passed.

use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

use super::{Feedback, Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::board::{Button, Key};
use crate::display::Framebuffer;
use crate::ui::{ACCENT, Alignment, DIM, HEADING_FONT, Label, Region, SMALL_FONT};

const MIN_SHOWN: Duration = Duration::from_millis(300);
const BAR_W: u16 = 240;
const BAR_H: u16 = 6;

pub struct BootScene {
    entered: Option<Instant>,
    duration: Duration,
}

impl Default for BootScene {
    fn default() -> Self {
        Self::new()
    }
}

impl BootScene {
    pub fn new() -> Self {
        Self {
            entered: None,
            duration: Duration::from_millis(1500),
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.entered
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
    }

    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed(now).as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

impl Scene for BootScene {
    fn id(&self) -> SceneId {
        SceneId::Boot
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.entered = Some(ctx.now);
        self.duration = Duration::try_from_secs_f32(ctx.config().ui.boot_duration_s)
            .unwrap_or(Duration::from_millis(1500));
        ctx.pulse(Feedback::Tick);
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: SceneEvent,
        ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError> {
        let skip = matches!(
            event,
            SceneEvent::Touch { .. }
                | SceneEvent::Key(Key::Enter)
                | SceneEvent::ButtonDown(Button::EncoderPush)
        );
        if skip && self.elapsed(ctx.now) >= MIN_SHOWN {
            log::info!("boot: skipped");
            return Ok(Transition::Goto(SceneId::Camera));
        }
        Ok(Transition::None)
    }

    fn update(&mut self, _dt: Duration, ctx: &mut SceneContext<'_>) -> Result<Transition, SceneError> {
        if self.entered.is_some() && self.elapsed(ctx.now) >= self.duration {
            return Ok(Transition::Goto(SceneId::Camera));
        }
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let w = fb.width();
        let mid = fb.height() / 2;
        fb.clear(Rgb565::BLACK).ok();

        Label::new(Region::new(0, mid.saturating_sub(50), w, 30), "POCKET CAM", HEADING_FONT)
            .alignment(Alignment::Center)
            .colors(ACCENT, Rgb565::BLACK)
            .draw(fb)
            .ok();

        let bar = Region::new(w.saturating_sub(BAR_W) / 2, mid, BAR_W, BAR_H);
        bar.to_rect()
            .into_styled(PrimitiveStyle::with_fill(DIM))
            .draw(fb)
            .ok();
        let filled = (BAR_W as f32 * self.progress(ctx.now)) as u32;
        Rectangle::new(bar.top_left(), Size::new(filled, BAR_H as u32))
            .into_styled(PrimitiveStyle::with_fill(ACCENT))
            .draw(fb)
            .ok();

        Label::new(Region::new(0, mid + 20, w, 12), env!("CARGO_PKG_VERSION"), SMALL_FONT)
            .alignment(Alignment::Center)
            .colors(DIM, Rgb565::BLACK)
            .draw(fb)
            .ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::haptic::SimHaptic;
    use crate::drivers::sensor::SensorReading;
    use crate::scenes::Services;

    fn services(haptic: SimHaptic) -> (tempfile::TempDir, Services) {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = crate::config::Config::default();
        cfg.storage.photos_dir = dir.path().to_path_buf();
        (dir, Services::simulated_with(cfg, haptic))
    }

    #[test]
    fn leaves_after_the_configured_time() {
        let sim = SimHaptic::new();
        let (_dir, mut s) = services(sim.clone());
        let t0 = Instant::now();
        let mut boot = BootScene::new();

        boot.on_enter(&mut SceneContext::new(&mut s, SensorReading::default(), t0))
            .unwrap();
        assert_eq!(sim.played(), [1]);

        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), t0 + Duration::from_millis(1499));
        assert_eq!(boot.update(Duration::ZERO, &mut ctx).unwrap(), Transition::None);
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), t0 + Duration::from_millis(1500));
        assert_eq!(
            boot.update(Duration::ZERO, &mut ctx).unwrap(),
            Transition::Goto(SceneId::Camera)
        );
    }

    #[test]
    fn tap_skips_only_after_minimum() {
        let (_dir, mut s) = services(SimHaptic::new());
        let t0 = Instant::now();
        let mut boot = BootScene::new();
        boot.on_enter(&mut SceneContext::new(&mut s, SensorReading::default(), t0))
            .unwrap();

        let tap = SceneEvent::Touch { x: 10, y: 10 };
        let mut early = SceneContext::new(&mut s, SensorReading::default(), t0 + Duration::from_millis(100));
        assert_eq!(boot.handle_event(tap, &mut early).unwrap(), Transition::None);
        let mut later = SceneContext::new(&mut s, SensorReading::default(), t0 + Duration::from_millis(400));
        assert_eq!(
            boot.handle_event(tap, &mut later).unwrap(),
            Transition::Goto(SceneId::Camera)
        );
    }
}
