// Photo directory
//
// Photos are flat files named photo_YYYYMMDD_HHMMSS[_NN].jpg, so a
// descending name sort is newest first. The directory is rescanned
// on demand; nothing is cached here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::display::Bitmap;

const PREFIX: &str = "photo_";
const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const MAX_SUFFIX: u32 = 99;

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("photo i/o: {0}")]
    Io(#[from] io::Error),
    #[error("photo decode: {0}")]
    Decode(#[from] image::ImageError),
    #[error("no free photo name for {0}")]
    NameExhausted(String),
}

pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), PhotoError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Photo paths, newest first. A missing directory is an empty list.
    pub fn list(&self) -> Result<Vec<PathBuf>, PhotoError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut photos = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if is_photo_name(&path) {
                photos.push(path);
            }
        }
        photos.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(photos)
    }

    pub fn count(&self) -> Result<usize, PhotoError> {
        Ok(self.list()?.len())
    }

    /// Unused path for a capture taken at `at`.
    pub fn next_path(&self, at: DateTime<Local>) -> Result<PathBuf, PhotoError> {
        let stem = format!("{}{}", PREFIX, at.format("%Y%m%d_%H%M%S"));
        let first = self.dir.join(format!("{}.jpg", stem));
        if !first.exists() {
            return Ok(first);
        }
        for n in 1..=MAX_SUFFIX {
            let p = self.dir.join(format!("{}_{:02}.jpg", stem, n));
            if !p.exists() {
                return Ok(p);
            }
        }
        Err(PhotoError::NameExhausted(stem))
    }

    pub fn delete(&self, path: &Path) -> Result<(), PhotoError> {
        fs::remove_file(path)?;
        log::info!("storage: deleted {}", path.display());
        Ok(())
    }

    /// Deletes the oldest photos beyond `max`. Returns how many went.
    pub fn enforce_limit(&self, max: usize) -> Result<usize, PhotoError> {
        let photos = self.list()?;
        let mut removed = 0;
        for old in photos.iter().skip(max) {
            self.delete(old)?;
            removed += 1;
        }
        if removed > 0 {
            log::info!("storage: removed {} photos over the limit of {}", removed, max);
        }
        Ok(removed)
    }
}

fn is_photo_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(PREFIX)
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Decodes photos into render-ready bitmaps.
pub trait PhotoLoader {
    fn load(&mut self, path: &Path) -> Result<Bitmap, PhotoError>;
}

/// Decodes with `image` and shrinks to fit the given box.
pub struct ImageLoader {
    max_w: u32,
    max_h: u32,
}

impl ImageLoader {
    pub fn new(max_w: u32, max_h: u32) -> Self {
        Self { max_w, max_h }
    }
}

impl PhotoLoader for ImageLoader {
    fn load(&mut self, path: &Path) -> Result<Bitmap, PhotoError> {
        let img = image::open(path)?;
        let img = if img.width() > self.max_w || img.height() > self.max_h {
            img.thumbnail(self.max_w, self.max_h)
        } else {
            img
        };
        Ok(Bitmap::from_rgb8(&img.to_rgb8()))
    }
}
