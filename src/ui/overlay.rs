// Viewfinder overlays: rule-of-thirds grid, level line, info bar and
// the touch debug layer. All drawn over the preview, never cleared.

use std::fmt::Write;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle};

use super::hitbox::Hitbox;
use super::widget::{Alignment, Region};
use super::{ACCENT, BAR_HEIGHT, Label, SMALL_FONT};
use crate::config::FlashMode;

const GRID: Rgb565 = Rgb565::new(20, 40, 20);
const LEVEL_OK: Rgb565 = Rgb565::GREEN;
const LEVEL_OFF: Rgb565 = Rgb565::WHITE;

// within this many degrees the line turns green
const LEVEL_TOLERANCE: f32 = 1.0;

pub fn draw_grid<D>(d: &mut D, area: Region) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let style = PrimitiveStyle::with_stroke(GRID, 1);
    let (x, y, w, h) = (area.x as i32, area.y as i32, area.w as i32, area.h as i32);
    for i in 1..3 {
        let gx = x + w * i / 3;
        let gy = y + h * i / 3;
        Line::new(Point::new(gx, y), Point::new(gx, y + h - 1))
            .into_styled(style)
            .draw(d)?;
        Line::new(Point::new(x, gy), Point::new(x + w - 1, gy))
            .into_styled(style)
            .draw(d)?;
    }
    Ok(())
}

/// Horizon line through the centre of `area`, rotated by `tilt_deg`.
pub fn draw_level<D>(d: &mut D, area: Region, tilt_deg: f32) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let color = if tilt_deg.abs() < LEVEL_TOLERANCE {
        LEVEL_OK
    } else {
        LEVEL_OFF
    };
    let cx = area.x as f32 + area.w as f32 / 2.0;
    let cy = area.y as f32 + area.h as f32 / 2.0;
    let half = area.w as f32 / 3.0;
    let (sin, cos) = tilt_deg.to_radians().sin_cos();
    let dx = half * cos;
    let dy = half * sin;

    Line::new(
        Point::new((cx - dx) as i32, (cy - dy) as i32),
        Point::new((cx + dx) as i32, (cy + dy) as i32),
    )
    .into_styled(PrimitiveStyle::with_stroke(color, 2))
    .draw(d)?;
    Circle::with_center(Point::new(cx as i32, cy as i32), 9)
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(d)
}

/// Inputs for the bottom info bar.
pub struct InfoBar<'a> {
    pub battery_pct: Option<u8>,
    pub clock: &'a str,
    pub flash: FlashMode,
    pub zoom: f32,
}

impl InfoBar<'_> {
    pub fn text(&self) -> String {
        let mut s = String::with_capacity(48);
        match self.battery_pct {
            Some(p) => {
                let _ = write!(s, "BAT {}%", p);
            }
            None => s.push_str("BAT --"),
        }
        let _ = write!(s, "  {}  FLASH {}", self.clock, self.flash.label());
        if self.zoom > 1.005 {
            let _ = write!(s, "  {:.1}x", self.zoom);
        }
        s
    }

    pub fn draw<D>(&self, d: &mut D, width: u16, bottom: u16) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let text = self.text();
        let region = Region::new(0, bottom.saturating_sub(BAR_HEIGHT), width, BAR_HEIGHT);
        Label::new(region.inset(4), &text, SMALL_FONT)
            .alignment(Alignment::CenterLeft)
            .transparent()
            .draw(d)
    }
}

/// Outlines every hitbox and marks the last logical tap.
pub fn draw_touch_debug<D>(d: &mut D, hitboxes: &[Hitbox], last_tap: Option<(u16, u16)>) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let outline = PrimitiveStyle::with_stroke(ACCENT, 1);
    for hb in hitboxes {
        hb.region.to_rect().into_styled(outline).draw(d)?;
    }
    if let Some((x, y)) = last_tap {
        let p = Point::new(x as i32, y as i32);
        let mark = PrimitiveStyle::with_stroke(Rgb565::RED, 1);
        Line::new(p - Point::new(8, 0), p + Point::new(8, 0))
            .into_styled(mark)
            .draw(d)?;
        Line::new(p - Point::new(0, 8), p + Point::new(0, 8))
            .into_styled(mark)
            .draw(d)?;
        Rectangle::new(p - Point::new(1, 1), Size::new(3, 3))
            .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
            .draw(d)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Action;
    use crate::display::Framebuffer;

    #[test]
    fn grid_lines_at_thirds() {
        let mut fb = Framebuffer::new(90, 60);
        draw_grid(&mut fb, Region::new(0, 0, 90, 60)).unwrap();
        assert_eq!(fb.pixel(30, 5), Some(GRID));
        assert_eq!(fb.pixel(60, 5), Some(GRID));
        assert_eq!(fb.pixel(5, 20), Some(GRID));
        assert_eq!(fb.pixel(5, 5), Some(Rgb565::BLACK));
    }

    #[test]
    fn level_colour_tracks_tilt() {
        let mut fb = Framebuffer::new(90, 60);
        draw_level(&mut fb, Region::new(0, 0, 90, 60), 0.2).unwrap();
        assert!((0..60).any(|y| fb.pixel(20, y) == Some(LEVEL_OK)));

        let mut fb = Framebuffer::new(90, 60);
        draw_level(&mut fb, Region::new(0, 0, 90, 60), 15.0).unwrap();
        assert!((0..60).all(|y| fb.pixel(20, y) != Some(LEVEL_OK)));
    }

    #[test]
    fn info_text() {
        let bar = InfoBar {
            battery_pct: Some(82),
            clock: "14:05",
            flash: FlashMode::Auto,
            zoom: 1.5,
        };
        assert_eq!(bar.text(), "BAT 82%  14:05  FLASH Auto  1.5x");

        let bar = InfoBar {
            battery_pct: None,
            clock: "09:00",
            flash: FlashMode::Off,
            zoom: 1.0,
        };
        assert_eq!(bar.text(), "BAT --  09:00  FLASH Off");
    }

    #[test]
    fn debug_layer_outlines_hitboxes() {
        let mut fb = Framebuffer::new(50, 50);
        let hb = Hitbox {
            id: "a".into(),
            region: Region::new(10, 10, 20, 20),
            action: Action::Capture,
        };
        draw_touch_debug(&mut fb, &[hb], Some((40, 40))).unwrap();
        assert_eq!(fb.pixel(10, 10), Some(ACCENT));
        assert_eq!(fb.pixel(40, 40), Some(Rgb565::RED));
    }
}
