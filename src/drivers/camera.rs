// Camera backends
//
// The app only needs a preview stream and a still capture. Image
// processing happens in the camera stack, not here. Two backends:
// TestPatternCamera for desktop runs and tests, StillCommandCamera
// which shells out to rpicam-still for captures on the Pi.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use embedded_graphics_core::pixelcolor::{Rgb565, Rgb888};

use crate::display::Bitmap;
use crate::drivers::HwError;

pub trait CameraBackend {
    fn name(&self) -> &'static str;
    fn start_preview(&mut self) -> Result<(), HwError>;
    fn stop_preview(&mut self) -> Result<(), HwError>;
    /// Latest preview frame, if a new one is ready.
    fn preview_frame(&mut self) -> Option<Bitmap>;
    fn capture_photo(&mut self, path: &Path, quality: u8) -> Result<(), HwError>;
    fn cleanup(&mut self);
}

/// Moving colour bars at preview resolution; captures encode a
/// full-size render of the same pattern.
pub struct TestPatternCamera {
    preview: (u16, u16),
    capture: (u32, u32),
    running: bool,
    epoch: Instant,
    captures: u32,
}

impl TestPatternCamera {
    pub fn new(preview: (u16, u16), capture: (u32, u32)) -> Self {
        Self {
            preview,
            capture,
            running: false,
            epoch: Instant::now(),
            captures: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn captures(&self) -> u32 {
        self.captures
    }

    fn bar_color(x: u32, width: u32, shift: u32) -> (u8, u8, u8) {
        const BARS: [(u8, u8, u8); 7] = [
            (235, 235, 235),
            (235, 235, 16),
            (16, 235, 235),
            (16, 235, 16),
            (235, 16, 235),
            (235, 16, 16),
            (16, 16, 235),
        ];
        let idx = ((x + shift) * BARS.len() as u32 / width.max(1)) as usize % BARS.len();
        BARS[idx]
    }
}

impl CameraBackend for TestPatternCamera {
    fn name(&self) -> &'static str {
        "test-pattern"
    }

    fn start_preview(&mut self) -> Result<(), HwError> {
        self.running = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), HwError> {
        self.running = false;
        Ok(())
    }

    fn preview_frame(&mut self) -> Option<Bitmap> {
        if !self.running {
            return None;
        }
        let (w, h) = self.preview;
        let shift = (self.epoch.elapsed().as_millis() / 40) as u32 % w.max(1) as u32;
        let mut frame = Bitmap::new(w, h, Rgb565::new(0, 0, 0));
        for x in 0..w {
            let (r, g, b) = Self::bar_color(x as u32, w as u32, shift);
            let c = Rgb565::from(Rgb888::new(r, g, b));
            for y in 0..h {
                frame.pixels[y as usize * w as usize + x as usize] = c;
            }
        }
        Some(frame)
    }

    fn capture_photo(&mut self, path: &Path, quality: u8) -> Result<(), HwError> {
        let (w, h) = self.capture;
        let img = image::RgbImage::from_fn(w, h, |x, _| {
            let (r, g, b) = Self::bar_color(x, w, 0);
            image::Rgb([r, g, b])
        });

        let is_png = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        let result = if is_png {
            img.save(path)
        } else {
            let out = BufWriter::new(File::create(path)?);
            let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(out, quality);
            enc.encode_image(&img)
        };
        result.map_err(|e| HwError::Camera(format!("encode {}: {}", path.display(), e)))?;

        self.captures += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.running = false;
    }
}

/// Stills via the Pi camera CLI; no live preview.
pub struct StillCommandCamera {
    program: String,
    width: u32,
    height: u32,
}

impl StillCommandCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            program: "rpicam-still".into(),
            width,
            height,
        }
    }
}

impl CameraBackend for StillCommandCamera {
    fn name(&self) -> &'static str {
        "rpicam-still"
    }

    fn start_preview(&mut self) -> Result<(), HwError> {
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), HwError> {
        Ok(())
    }

    fn preview_frame(&mut self) -> Option<Bitmap> {
        None
    }

    fn capture_photo(&mut self, path: &Path, quality: u8) -> Result<(), HwError> {
        let out = Command::new(&self.program)
            .args(["--nopreview", "--immediate", "-t", "1"])
            .arg("--width")
            .arg(self.width.to_string())
            .arg("--height")
            .arg(self.height.to_string())
            .arg("-q")
            .arg(quality.to_string())
            .arg("-o")
            .arg(path)
            .output()
            .map_err(|e| HwError::Camera(format!("{}: {}", self.program, e)))?;

        if !out.status.success() {
            return Err(HwError::Camera(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }

    fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_only_while_running() {
        let mut cam = TestPatternCamera::new((64, 48), (64, 48));
        assert!(cam.preview_frame().is_none());
        cam.start_preview().unwrap();
        let f = cam.preview_frame().unwrap();
        assert_eq!((f.width, f.height), (64, 48));
        assert_eq!(f.pixels.len(), 64 * 48);
        cam.stop_preview().unwrap();
        assert!(cam.preview_frame().is_none());
    }

    #[test]
    fn capture_writes_a_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo_test.jpg");
        let mut cam = TestPatternCamera::new((32, 24), (96, 72));
        cam.capture_photo(&path, 80).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (96, 72));
        assert_eq!(cam.captures(), 1);
    }

    #[test]
    fn capture_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = TestPatternCamera::new((8, 8), (8, 8));
        let err = cam
            .capture_photo(&dir.path().join("nope").join("x.jpg"), 90)
            .unwrap_err();
        assert!(matches!(err, HwError::Io(_)));
    }
}
