// Logical canvas, panel rotation and frame presentation
//
// Scenes draw portrait into a logical Rgb565 Framebuffer. Before the
// frame reaches the panel it is rotated into a PhysicalFrame; touch
// points travel the opposite way. Both directions are methods on the
// same Rotation value, on the integer pixel grid, so one is always
// the exact inverse of the other.

use core::convert::Infallible;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Point, Size},
    pixelcolor::{Rgb565, Rgb888, RgbColor},
    primitives::Rectangle,
};

use crate::drivers::HwError;
use crate::ui::Region;

pub const LOGICAL_W: u16 = 480;
pub const LOGICAL_H: u16 = 800;

/// Clockwise rotation applied to the logical frame on its way to the
/// panel. Calibrated per mount and fixed for the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub const fn from_degrees(deg: u16) -> Option<Self> {
        match deg {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Physical panel size for a logical canvas of `lw` x `lh`.
    pub const fn physical_size(self, lw: u16, lh: u16) -> (u16, u16) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (lw, lh),
            Rotation::Deg90 | Rotation::Deg270 => (lh, lw),
        }
    }

    /// Where logical pixel (lx, ly) lands on the panel.
    /// Inputs must be inside the logical canvas.
    pub fn to_physical(self, lx: u16, ly: u16, lw: u16, lh: u16) -> (u16, u16) {
        match self {
            Rotation::Deg0 => (lx, ly),
            Rotation::Deg90 => (lh - 1 - ly, lx),
            Rotation::Deg180 => (lw - 1 - lx, lh - 1 - ly),
            Rotation::Deg270 => (ly, lw - 1 - lx),
        }
    }

    /// Maps a physical touch point back into logical space.
    ///
    /// Out-of-bounds touches (digitizers report a few pixels past the
    /// visible edge) are clamped to the panel first, so the result is
    /// always a valid logical pixel.
    pub fn to_logical(self, px: u16, py: u16, lw: u16, lh: u16) -> (u16, u16) {
        let (pw, ph) = self.physical_size(lw, lh);
        let px = px.min(pw.saturating_sub(1));
        let py = py.min(ph.saturating_sub(1));
        match self {
            Rotation::Deg0 => (px, py),
            Rotation::Deg90 => (py, lh - 1 - px),
            Rotation::Deg180 => (lw - 1 - px, lh - 1 - py),
            Rotation::Deg270 => (lw - 1 - py, px),
        }
    }
}

/// Owned Rgb565 image: preview frames, decoded photos.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<Rgb565>,
}

impl Bitmap {
    pub fn new(width: u16, height: u16, fill: Rgb565) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    pub fn from_rgb8(img: &image::RgbImage) -> Self {
        let width = img.width().min(u16::MAX as u32) as u16;
        let height = img.height().min(u16::MAX as u32) as u16;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as u32 {
            for x in 0..width as u32 {
                let [r, g, b] = img.get_pixel(x, y).0;
                pixels.push(Rgb565::from(Rgb888::new(r, g, b)));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn to_rgb8(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let c = Rgb888::from(self.pixels[y as usize * self.width as usize + x as usize]);
            image::Rgb([c.r(), c.g(), c.b()])
        })
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }
}

/// Logical framebuffer scenes render into.
pub struct Framebuffer {
    width: u16,
    height: u16,
    pixels: Vec<Rgb565>,
}

impl Framebuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; width as usize * height as usize],
        }
    }

    pub fn logical() -> Self {
        Self::new(LOGICAL_W, LOGICAL_H)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    #[inline]
    fn put(&mut self, x: u16, y: u16, color: Rgb565) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = color;
        }
    }

    /// Nearest-neighbour blit of `src` into `dest`, aspect preserved
    /// and centred. `zoom` > 1 crops the centre of the source.
    pub fn blit_fit(&mut self, src: &Bitmap, dest: Region, zoom: f32) {
        if src.width == 0 || src.height == 0 || dest.w == 0 || dest.h == 0 {
            return;
        }
        let zoom = if zoom.is_finite() { zoom.max(1.0) } else { 1.0 };

        let crop_w = (src.width as f32 / zoom).max(1.0);
        let crop_h = (src.height as f32 / zoom).max(1.0);
        let crop_x = (src.width as f32 - crop_w) / 2.0;
        let crop_y = (src.height as f32 - crop_h) / 2.0;

        let scale = (dest.w as f32 / crop_w).min(dest.h as f32 / crop_h);
        let out_w = ((crop_w * scale) as u16).clamp(1, dest.w);
        let out_h = ((crop_h * scale) as u16).clamp(1, dest.h);
        let off_x = dest.x + (dest.w - out_w) / 2;
        let off_y = dest.y + (dest.h - out_h) / 2;

        let src_w = src.width as usize;
        for oy in 0..out_h {
            let sy = ((crop_y + (oy as f32 + 0.5) / scale) as usize).min(src.height as usize - 1);
            for ox in 0..out_w {
                let sx = ((crop_x + (ox as f32 + 0.5) / scale) as usize).min(src_w - 1);
                self.put(off_x + ox, off_y + oy, src.pixels[sy * src_w + sx]);
            }
        }
    }

    /// Rotates the logical frame into `out` for the panel.
    pub fn rotate_into(&self, rotation: Rotation, out: &mut PhysicalFrame) {
        let (pw, ph) = rotation.physical_size(self.width, self.height);
        out.resize(pw, ph);
        for ly in 0..self.height {
            let row = ly as usize * self.width as usize;
            for lx in 0..self.width {
                let (px, py) = rotation.to_physical(lx, ly, self.width, self.height);
                out.pixels[py as usize * pw as usize + px as usize] = self.pixels[row + lx as usize];
            }
        }
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
                continue;
            }
            self.put(x as u16, y as u16, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        for y in area.top_left.y..=bottom_right.y {
            let row = y as usize * self.width as usize;
            let start = row + area.top_left.x as usize;
            let end = row + bottom_right.x as usize + 1;
            self.pixels[start..end].fill(color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

/// Frame in panel orientation, ready to scan out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalFrame {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<Rgb565>,
}

impl PhysicalFrame {
    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.pixels
            .resize(width as usize * height as usize, Rgb565::BLACK);
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }
}

/// Whatever scans the physical frame out: fbdev, a PNG dump, nothing.
pub trait DisplaySink {
    fn present(&mut self, frame: &PhysicalFrame) -> Result<(), HwError>;
}

/// Keeps the last presented frame; used headless and in tests.
#[derive(Default)]
pub struct HeadlessSink {
    frames: u64,
    last: PhysicalFrame,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last(&self) -> &PhysicalFrame {
        &self.last
    }
}

impl DisplaySink for HeadlessSink {
    fn present(&mut self, frame: &PhysicalFrame) -> Result<(), HwError> {
        self.frames += 1;
        self.last.clone_from(frame);
        Ok(())
    }
}

/// Desktop stand-in for the panel: dumps the frame to a PNG now and then.
pub struct SnapshotSink {
    path: PathBuf,
    every: Duration,
    last_write: Option<Instant>,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>, every: Duration) -> Self {
        Self {
            path: path.into(),
            every,
            last_write: None,
        }
    }
}

impl DisplaySink for SnapshotSink {
    fn present(&mut self, frame: &PhysicalFrame) -> Result<(), HwError> {
        let now = Instant::now();
        if self.last_write.is_some_and(|t| now - t < self.every) {
            return Ok(());
        }
        self.last_write = Some(now);

        let bmp = Bitmap {
            width: frame.width,
            height: frame.height,
            pixels: frame.pixels.clone(),
        };
        bmp.to_rgb8()
            .save(&self.path)
            .map_err(|e| HwError::Display(format!("snapshot {}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::{prelude::*, primitives::PrimitiveStyle};

    // small canvas keeps the exhaustive sweeps fast
    const LW: u16 = 12;
    const LH: u16 = 20;

    #[test]
    fn physical_round_trip_is_exact_for_every_rotation() {
        for rotation in Rotation::ALL {
            let (pw, ph) = rotation.physical_size(LW, LH);
            for py in 0..ph {
                for px in 0..pw {
                    let (lx, ly) = rotation.to_logical(px, py, LW, LH);
                    assert!(lx < LW && ly < LH, "{:?} ({},{})", rotation, px, py);
                    assert_eq!(
                        rotation.to_physical(lx, ly, LW, LH),
                        (px, py),
                        "{:?} ({},{})",
                        rotation,
                        px,
                        py
                    );
                }
            }
        }
    }

    #[test]
    fn tapping_a_rendered_pixel_reports_it_back() {
        for rotation in Rotation::ALL {
            for (lx, ly) in [(0, 0), (LW - 1, 0), (0, LH - 1), (LW - 1, LH - 1), (5, 13)] {
                let mut fb = Framebuffer::new(LW, LH);
                fb.clear(Rgb565::BLACK).unwrap();
                Pixel(Point::new(lx as i32, ly as i32), Rgb565::RED)
                    .draw(&mut fb)
                    .unwrap();

                let mut phys = PhysicalFrame::default();
                fb.rotate_into(rotation, &mut phys);

                let lit: Vec<(u16, u16)> = (0..phys.height)
                    .flat_map(|y| (0..phys.width).map(move |x| (x, y)))
                    .filter(|&(x, y)| phys.pixel(x, y) == Some(Rgb565::RED))
                    .collect();
                assert_eq!(lit.len(), 1, "{:?}", rotation);

                let (px, py) = lit[0];
                assert_eq!(rotation.to_logical(px, py, LW, LH), (lx, ly), "{:?}", rotation);
            }
        }
    }

    #[test]
    fn deg90_matches_portrait_on_landscape_mount() {
        let r = Rotation::Deg90;
        assert_eq!(r.physical_size(LOGICAL_W, LOGICAL_H), (800, 480));
        // logical top-left is the panel's top-right corner
        assert_eq!(r.to_physical(0, 0, LOGICAL_W, LOGICAL_H), (799, 0));
        assert_eq!(r.to_logical(799, 0, LOGICAL_W, LOGICAL_H), (0, 0));
        assert_eq!(r.to_logical(0, 479, LOGICAL_W, LOGICAL_H), (479, 799));
    }

    #[test]
    fn out_of_bounds_touches_are_clamped() {
        let r = Rotation::Deg270;
        let (lx, ly) = r.to_logical(9000, 9000, LOGICAL_W, LOGICAL_H);
        assert_eq!((lx, ly), r.to_logical(799, 479, LOGICAL_W, LOGICAL_H));
        assert!(lx < LOGICAL_W && ly < LOGICAL_H);
    }

    #[test]
    fn degrees_round_trip() {
        for r in Rotation::ALL {
            assert_eq!(Rotation::from_degrees(r.degrees()), Some(r));
        }
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn fill_solid_clips_to_canvas() {
        let mut fb = Framebuffer::new(LW, LH);
        Rectangle::new(Point::new(-4, 18), Size::new(8, 10))
            .into_styled(PrimitiveStyle::with_fill(Rgb565::GREEN))
            .draw(&mut fb)
            .unwrap();
        assert_eq!(fb.pixel(0, 19), Some(Rgb565::GREEN));
        assert_eq!(fb.pixel(3, 18), Some(Rgb565::GREEN));
        assert_eq!(fb.pixel(4, 18), Some(Rgb565::BLACK));
        assert_eq!(fb.pixel(0, 17), Some(Rgb565::BLACK));
    }

    #[test]
    fn blit_fit_letterboxes_and_zooms() {
        let mut src = Bitmap::new(4, 2, Rgb565::BLUE);
        src.pixels[0] = Rgb565::RED;
        let mut fb = Framebuffer::new(8, 8);
        fb.blit_fit(&src, Region::new(0, 0, 8, 8), 1.0);
        // 4x2 scaled by 2 into 8x4, centred vertically
        assert_eq!(fb.pixel(0, 1), Some(Rgb565::BLACK));
        assert_eq!(fb.pixel(0, 2), Some(Rgb565::RED));
        assert_eq!(fb.pixel(7, 5), Some(Rgb565::BLUE));
        assert_eq!(fb.pixel(0, 6), Some(Rgb565::BLACK));

        let mut zoomed = Framebuffer::new(8, 8);
        zoomed.blit_fit(&src, Region::new(0, 0, 8, 8), 2.0);
        // centre crop never shows the red corner
        assert!(!zoomed.pixels.contains(&Rgb565::RED));
    }
}
