// Display backlight
//
// Levels are 0..=255 everywhere in the app and scaled to the
// driver's max_brightness on write. The sysfs node is looked up from
// the known panel driver names in board::BACKLIGHT_DIRS.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::board::BACKLIGHT_DIRS;
use crate::drivers::HwError;

pub trait Backlight {
    fn set_brightness(&mut self, level: u8) -> Result<(), HwError>;
}

pub struct SysfsBacklight {
    brightness: PathBuf,
    max: u32,
}

impl SysfsBacklight {
    pub fn open(dir: &Path) -> Result<Self, HwError> {
        let raw = fs::read_to_string(dir.join("max_brightness"))?;
        let max = raw
            .trim()
            .parse::<u32>()
            .map_err(|e| HwError::Display(format!("max_brightness {:?}: {}", raw.trim(), e)))?;
        Ok(Self {
            brightness: dir.join("brightness"),
            max: max.max(1),
        })
    }

    /// First backlight class device that opens.
    pub fn detect() -> Option<Self> {
        BACKLIGHT_DIRS.iter().find_map(|dir| match Self::open(Path::new(dir)) {
            Ok(bl) => {
                log::info!("backlight: {} (max {})", dir, bl.max);
                Some(bl)
            }
            Err(_) => None,
        })
    }

    fn scaled(&self, level: u8) -> u32 {
        (level as u32 * self.max + 127) / 255
    }
}

impl Backlight for SysfsBacklight {
    fn set_brightness(&mut self, level: u8) -> Result<(), HwError> {
        fs::write(&self.brightness, format!("{}\n", self.scaled(level)))?;
        Ok(())
    }
}

/// Records every level written; cloned handles share the record.
#[derive(Clone, Default)]
pub struct SimBacklight {
    levels: Rc<RefCell<Vec<u8>>>,
}

impl SimBacklight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<u8> {
        self.levels.borrow().clone()
    }

    pub fn current(&self) -> Option<u8> {
        self.levels.borrow().last().copied()
    }
}

impl Backlight for SimBacklight {
    fn set_brightness(&mut self, level: u8) -> Result<(), HwError> {
        self.levels.borrow_mut().push(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysfs_levels_are_scaled_to_driver_range() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("max_brightness"), "31\n").unwrap();
        let mut bl = SysfsBacklight::open(dir.path()).unwrap();

        bl.set_brightness(255).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("brightness")).unwrap(), "31\n");
        bl.set_brightness(0).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("brightness")).unwrap(), "0\n");
        bl.set_brightness(128).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("brightness")).unwrap(), "16\n");
    }

    #[test]
    fn missing_node_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SysfsBacklight::open(dir.path()).is_err());
    }

    #[test]
    fn sim_records_history() {
        let bl = SimBacklight::new();
        let mut handle = bl.clone();
        handle.set_brightness(120).unwrap();
        handle.set_brightness(0).unwrap();
        assert_eq!(bl.levels(), [120, 0]);
        assert_eq!(bl.current(), Some(0));
    }
}
