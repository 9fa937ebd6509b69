// Linux fbdev display sink
//
// Geometry and depth come from sysfs; the whole frame is written at
// offset 0 every present. 16 bpp panels take RGB565 little endian,
// 32 bpp take BGRA.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use embedded_graphics_core::pixelcolor::Rgb888;
use embedded_graphics_core::prelude::*;

use crate::display::{DisplaySink, PhysicalFrame};
use crate::drivers::HwError;

pub struct FbdevSink {
    file: File,
    width: u16,
    height: u16,
    bpp: u8,
    stride: usize,
    buf: Vec<u8>,
}

impl FbdevSink {
    /// `dev` like /dev/fb0; its sysfs node is derived from the name.
    pub fn open(dev: &Path) -> Result<Self, HwError> {
        let name = dev
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HwError::Display(format!("bad device {}", dev.display())))?;
        let sys = Path::new("/sys/class/graphics").join(name);
        Self::open_with_sysfs(dev, &sys)
    }

    pub fn open_with_sysfs(dev: &Path, sys: &Path) -> Result<Self, HwError> {
        let size = fs::read_to_string(sys.join("virtual_size"))?;
        let (width, height) = parse_size(&size)
            .ok_or_else(|| HwError::Display(format!("virtual_size {:?}", size.trim())))?;
        let bpp_raw = fs::read_to_string(sys.join("bits_per_pixel"))?;
        let bpp: u8 = match bpp_raw.trim().parse() {
            Ok(b @ (16 | 32)) => b,
            _ => {
                return Err(HwError::Display(format!(
                    "unsupported depth {:?}",
                    bpp_raw.trim()
                )));
            }
        };
        let stride = match fs::read_to_string(sys.join("stride")) {
            Ok(s) => s.trim().parse().unwrap_or(width as usize * bpp as usize / 8),
            Err(_) => width as usize * bpp as usize / 8,
        };

        let file = OpenOptions::new().write(true).open(dev)?;
        log::info!(
            "framebuffer: {} {}x{} {}bpp stride {}",
            dev.display(),
            width,
            height,
            bpp,
            stride
        );
        Ok(Self {
            file,
            width,
            height,
            bpp,
            stride,
            buf: vec![0u8; stride * height as usize],
        })
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn pack(&mut self, frame: &PhysicalFrame) {
        let w = frame.width.min(self.width) as usize;
        let h = frame.height.min(self.height) as usize;
        let bytes = self.bpp as usize / 8;
        for y in 0..h {
            let src = &frame.pixels[y * frame.width as usize..][..w];
            let dst = &mut self.buf[y * self.stride..][..w * bytes];
            match self.bpp {
                16 => {
                    for (d, p) in dst.chunks_exact_mut(2).zip(src) {
                        d.copy_from_slice(&p.into_storage().to_le_bytes());
                    }
                }
                _ => {
                    for (d, p) in dst.chunks_exact_mut(4).zip(src) {
                        let c = Rgb888::from(*p);
                        d.copy_from_slice(&[c.b(), c.g(), c.r(), 0xFF]);
                    }
                }
            }
        }
    }
}

impl DisplaySink for FbdevSink {
    fn present(&mut self, frame: &PhysicalFrame) -> Result<(), HwError> {
        if (frame.width, frame.height) != (self.width, self.height) {
            log::debug!(
                "framebuffer: frame {}x{} on {}x{} panel",
                frame.width,
                frame.height,
                self.width,
                self.height
            );
        }
        self.pack(frame);
        self.file.write_all_at(&self.buf, 0)?;
        Ok(())
    }
}

fn parse_size(s: &str) -> Option<(u16, u16)> {
    let (w, h) = s.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics_core::pixelcolor::Rgb565;

    fn fake_fb(bpp: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let sys = dir.path().join("sys");
        fs::create_dir(&sys).unwrap();
        fs::write(sys.join("virtual_size"), "4,2\n").unwrap();
        fs::write(sys.join("bits_per_pixel"), bpp).unwrap();
        let dev = dir.path().join("fb0");
        fs::write(&dev, b"").unwrap();
        (dir, dev)
    }

    fn frame(c: Rgb565) -> PhysicalFrame {
        PhysicalFrame {
            width: 4,
            height: 2,
            pixels: vec![c; 8],
        }
    }

    #[test]
    fn sixteen_bit_is_little_endian_rgb565() {
        let (dir, dev) = fake_fb("16\n");
        let mut fb = FbdevSink::open_with_sysfs(&dev, &dir.path().join("sys")).unwrap();
        fb.present(&frame(Rgb565::RED)).unwrap();
        let bytes = fs::read(&dev).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..2], &Rgb565::RED.into_storage().to_le_bytes());
    }

    #[test]
    fn thirty_two_bit_is_bgra() {
        let (dir, dev) = fake_fb("32");
        let mut fb = FbdevSink::open_with_sysfs(&dev, &dir.path().join("sys")).unwrap();
        fb.present(&frame(Rgb565::BLUE)).unwrap();
        let bytes = fs::read(&dev).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn odd_depth_is_rejected() {
        let (dir, dev) = fake_fb("24");
        assert!(FbdevSink::open_with_sysfs(&dev, &dir.path().join("sys")).is_err());
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("800,480\n"), Some((800, 480)));
        assert_eq!(parse_size("800x480"), None);
    }
}
