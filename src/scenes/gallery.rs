// Photo browser, newest first.
//
// Decoded images go through a two-slot PhotoCache so stepping back and
// forth between neighbours does not decode twice. A photo that fails
// to decode shows a notice; it is not a scene fault.

use std::path::PathBuf;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use super::{Feedback, PhotoCache, Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::board::{Action, Key};
use crate::display::Framebuffer;
use crate::ui::{
    Alignment, BODY_FONT, DIM, Gesture, Label, PANEL, Region, SMALL_FONT, wrap_step,
};

pub const BACK_BTN: Region = Region::new(16, 16, 96, 56);
pub const DELETE_BTN: Region = Region::new(368, 16, 96, 56);
const PHOTO_TOP: u16 = 80;
const COUNTER_H: u16 = 40;

#[derive(Default)]
pub struct GalleryScene {
    photos: Vec<PathBuf>,
    index: usize,
    cache: PhotoCache,
}

impl GalleryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&PathBuf> {
        self.photos.get(self.index)
    }

    pub fn cache(&self) -> &PhotoCache {
        &self.cache
    }

    /// "i of n", 1-based; empty when there are no photos.
    pub fn counter(&self) -> String {
        if self.photos.is_empty() {
            String::new()
        } else {
            format!("{} of {}", self.index + 1, self.photos.len())
        }
    }

    fn rescan(&mut self, ctx: &SceneContext<'_>) -> Result<(), SceneError> {
        self.photos = ctx.services.photos.list()?;
        self.cache.clear();
        if self.index >= self.photos.len() {
            self.index = self.photos.len().saturating_sub(1);
        }
        log::info!("gallery: {} photos", self.photos.len());
        Ok(())
    }

    fn step(&mut self, delta: i32, ctx: &mut SceneContext<'_>) {
        if self.photos.len() < 2 {
            return;
        }
        self.index = wrap_step(self.index, delta, self.photos.len());
        ctx.pulse(Feedback::Tick);
    }

    fn delete_current(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let Some(path) = self.photos.get(self.index).cloned() else {
            return Ok(());
        };
        match ctx.services.photos.delete(&path) {
            Ok(()) => ctx.pulse(Feedback::Confirm),
            Err(e) => {
                log::warn!("gallery: delete {}: {}", path.display(), e);
                ctx.pulse(Feedback::Error);
            }
        }
        self.rescan(ctx)
    }
}

impl Scene for GalleryScene {
    fn id(&self) -> SceneId {
        SceneId::Gallery
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.index = 0;
        self.rescan(ctx)
    }

    fn on_exit(&mut self, _ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        self.cache.clear();
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: SceneEvent,
        ctx: &mut SceneContext<'_>,
    ) -> Result<Transition, SceneError> {
        match event {
            SceneEvent::Key(Key::Escape) => return Ok(Transition::Goto(SceneId::Camera)),
            SceneEvent::Encoder(d) => self.step(d as i32, ctx),
            SceneEvent::Key(Key::Right | Key::Down) | SceneEvent::Gesture(Gesture::SwipeLeft) => {
                self.step(1, ctx)
            }
            SceneEvent::Key(Key::Left | Key::Up) | SceneEvent::Gesture(Gesture::SwipeRight) => {
                self.step(-1, ctx)
            }
            SceneEvent::Action(Action::DeletePhoto) | SceneEvent::Key(Key::Delete) => {
                self.delete_current(ctx)?
            }
            _ => {}
        }
        Ok(Transition::None)
    }

    fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) -> Result<(), SceneError> {
        let w = fb.width();
        let h = fb.height();
        fb.clear(Rgb565::BLACK).ok();

        for (region, text) in [(BACK_BTN, "< Back"), (DELETE_BTN, "Delete")] {
            Label::new(region, text, BODY_FONT)
                .alignment(Alignment::Center)
                .colors(Rgb565::WHITE, PANEL)
                .draw(fb)
                .ok();
        }

        let area = Region::new(0, PHOTO_TOP, w, h - PHOTO_TOP - COUNTER_H);
        let mid = Region::new(0, area.y + area.h / 2 - 12, w, 24);

        if self.photos.is_empty() {
            Label::new(mid, "No photos yet", BODY_FONT)
                .alignment(Alignment::Center)
                .colors(DIM, Rgb565::BLACK)
                .draw(fb)
                .ok();
            return Ok(());
        }

        let photos = &self.photos;
        let loader = &mut ctx.services.loader;
        match self.cache.get(self.index, |i| loader.load(&photos[i])) {
            Ok(bitmap) => fb.blit_fit(bitmap, area, 1.0),
            Err(e) => {
                log::warn!("gallery: {}: {}", photos[self.index].display(), e);
                Label::new(mid, "Cannot open photo", BODY_FONT)
                    .alignment(Alignment::Center)
                    .colors(DIM, Rgb565::BLACK)
                    .draw(fb)
                    .ok();
            }
        }

        let counter = self.counter();
        Label::new(Region::new(0, h - COUNTER_H, w, COUNTER_H), &counter, SMALL_FONT)
            .alignment(Alignment::Center)
            .colors(Rgb565::WHITE, Rgb565::BLACK)
            .draw(fb)
            .ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sensor::SensorReading;
    use crate::scenes::Services;
    use std::path::Path;
    use std::time::Instant;

    fn write_png(dir: &Path, name: &str, shade: u8) {
        std::fs::create_dir_all(dir).unwrap();
        let img = image::RgbImage::from_pixel(8, 6, image::Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    fn setup(names: &[&str]) -> (tempfile::TempDir, Services) {
        let dir = tempfile::tempdir().unwrap();
        let s = Services::simulated(dir.path());
        for (i, n) in names.iter().enumerate() {
            write_png(&dir.path().join("photos"), n, 40 * i as u8 + 40);
        }
        (dir, s)
    }

    #[test]
    fn lists_newest_first_with_counter() {
        let (_dir, mut s) = setup(&["photo_20240101_000000.png", "photo_20240301_000000.png"]);
        let mut g = GalleryScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        g.on_enter(&mut ctx).unwrap();

        assert_eq!(g.len(), 2);
        assert!(g.current().unwrap().ends_with("photo_20240301_000000.png"));
        assert_eq!(g.counter(), "1 of 2");
    }

    #[test]
    fn swipes_and_encoder_wrap() {
        let (_dir, mut s) = setup(&[
            "photo_20240101_000000.png",
            "photo_20240201_000000.png",
            "photo_20240301_000000.png",
        ]);
        let mut g = GalleryScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        g.on_enter(&mut ctx).unwrap();

        g.handle_event(SceneEvent::Gesture(Gesture::SwipeLeft), &mut ctx).unwrap();
        assert_eq!(g.index(), 1);
        g.handle_event(SceneEvent::Gesture(Gesture::SwipeRight), &mut ctx).unwrap();
        g.handle_event(SceneEvent::Encoder(-1), &mut ctx).unwrap();
        assert_eq!(g.index(), 2);
        assert_eq!(g.counter(), "3 of 3");
    }

    #[test]
    fn render_decodes_through_the_cache() {
        let (_dir, mut s) = setup(&["photo_20240101_000000.png", "photo_20240201_000000.png"]);
        let mut g = GalleryScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        g.on_enter(&mut ctx).unwrap();

        let mut fb = Framebuffer::logical();
        g.render(&mut fb, &mut ctx).unwrap();
        g.handle_event(SceneEvent::Key(Key::Right), &mut ctx).unwrap();
        g.render(&mut fb, &mut ctx).unwrap();
        g.handle_event(SceneEvent::Key(Key::Left), &mut ctx).unwrap();
        g.render(&mut fb, &mut ctx).unwrap();

        assert_eq!(g.cache().len(), 2);
        assert!(g.cache().contains(0) && g.cache().contains(1));
        assert_ne!(fb.pixel(240, 400), Some(Rgb565::BLACK));
    }

    #[test]
    fn delete_removes_file_and_rescans() {
        let (dir, mut s) = setup(&["photo_20240101_000000.png", "photo_20240201_000000.png"]);
        let mut g = GalleryScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        g.on_enter(&mut ctx).unwrap();
        g.handle_event(SceneEvent::Key(Key::Right), &mut ctx).unwrap();

        g.handle_event(SceneEvent::Action(Action::DeletePhoto), &mut ctx).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.index(), 0);
        assert!(g.cache().is_empty());
        assert!(!dir.path().join("photos/photo_20240101_000000.png").exists());

        g.handle_event(SceneEvent::Key(Key::Delete), &mut ctx).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.counter(), "");
    }

    #[test]
    fn undecodable_photo_is_not_a_fault() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Services::simulated(dir.path());
        let photos = dir.path().join("photos");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::write(photos.join("photo_20240101_000000.jpg"), b"not a jpeg").unwrap();

        let mut g = GalleryScene::new();
        let mut ctx = SceneContext::new(&mut s, SensorReading::default(), Instant::now());
        g.on_enter(&mut ctx).unwrap();
        let mut fb = Framebuffer::logical();
        assert!(g.render(&mut fb, &mut ctx).is_ok());
        assert!(g.cache().is_empty());
    }
}
