// Text labels over the Rgb565 canvas
// Label borrows its text and fills its region before drawing,
// so redrawing a label never leaves stale glyphs behind.

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::PrimitiveStyle,
    text::{Baseline, Text},
};

use super::widget::{Alignment, Region};

pub struct Label<'a> {
    region: Region,
    text: &'a str,
    font: &'static MonoFont<'static>,
    alignment: Alignment,
    fg: Rgb565,
    bg: Option<Rgb565>,
    inverted: bool,
}

impl<'a> Label<'a> {
    pub fn new(region: Region, text: &'a str, font: &'static MonoFont<'static>) -> Self {
        Self {
            region,
            text,
            font,
            alignment: Alignment::CenterLeft,
            fg: Rgb565::WHITE,
            bg: Some(Rgb565::BLACK),
            inverted: false,
        }
    }

    pub const fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub const fn colors(mut self, fg: Rgb565, bg: Rgb565) -> Self {
        self.fg = fg;
        self.bg = Some(bg);
        self
    }

    /// Draw glyphs only, over whatever is already there (preview overlays).
    pub const fn transparent(mut self) -> Self {
        self.bg = None;
        self
    }

    pub const fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    fn text_size(&self) -> Size {
        let char_width = self.font.character_size.width + self.font.character_spacing;
        let width = self.text.chars().count() as u32 * char_width;
        let height = self.font.character_size.height;
        Size::new(width, height)
    }

    pub fn draw<D>(&self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let (fg, bg) = match (self.inverted, self.bg) {
            (true, Some(bg)) => (bg, Some(self.fg)),
            (true, None) => (Rgb565::BLACK, Some(self.fg)),
            (false, bg) => (self.fg, bg),
        };

        if let Some(bg) = bg {
            self.region
                .to_rect()
                .into_styled(PrimitiveStyle::with_fill(bg))
                .draw(display)?;
        }

        let pos = self.alignment.position(self.region, self.text_size());
        let style = MonoTextStyle::new(self.font, fg);
        Text::with_baseline(self.text, pos, style, Baseline::Top).draw(display)?;

        Ok(())
    }
}
