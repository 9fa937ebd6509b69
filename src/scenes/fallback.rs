// Shown after any scene fault, until restart. Static, no input.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use super::registry::Fault;
use super::{Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::display::Framebuffer;
use crate::ui::{Alignment, BODY_FONT, HEADING_FONT, Label, Region, SMALL_FONT};

const ERROR_RED: Rgb565 = Rgb565::new(24, 8, 4);

#[derive(Default)]
pub struct FallbackScene {
    detail: String,
}

impl FallbackScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&mut self, fault: &Fault) {
        self.detail = format!("{}.{}", fault.scene, fault.method);
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Scene for FallbackScene {
    fn id(&self) -> SceneId {
        SceneId::Fallback
    }

    fn on_enter(&mut self, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        _event: SceneEvent,
        _ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError> {
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let w = fb.width();
        let mid = fb.height() / 2;
        fb.clear(Rgb565::BLACK).ok();

        let title = Region::new(0, mid.saturating_sub(60), w, 30);
        Label::new(title, "Something went wrong", HEADING_FONT)
            .alignment(Alignment::Center)
            .colors(ERROR_RED, Rgb565::BLACK)
            .draw(fb)
            .ok();

        let hint = Region::new(0, mid.saturating_sub(20), w, 24);
        Label::new(hint, "Restart the camera", BODY_FONT)
            .alignment(Alignment::Center)
            .draw(fb)
            .ok();

        if !self.detail.is_empty() {
            let info = Region::new(0, mid + 20, w, 16);
            Label::new(info, &self.detail, SMALL_FONT)
                .alignment(Alignment::Center)
                .colors(crate::ui::DIM, Rgb565::BLACK)
                .draw(fb)
                .ok();
        }
        Ok(())
    }
}
