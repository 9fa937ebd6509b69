// Decoded photo cache for the gallery
//
// Two slots, keyed by list index. A miss loads through the caller's
// loader and, when full, evicts the smallest resident index. Hits do
// not reorder anything. Failed loads are never stored, the next get
// retries.

use std::collections::BTreeMap;

use crate::display::Bitmap;
use crate::drivers::storage::PhotoError;

pub const DEFAULT_CAPACITY: usize = 2;

pub struct PhotoCache {
    capacity: usize,
    entries: BTreeMap<usize, Bitmap>,
}

impl Default for PhotoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PhotoCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Resident indices, ascending.
    pub fn resident(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    pub fn peek(&self, index: usize) -> Option<&Bitmap> {
        self.entries.get(&index)
    }

    pub fn get<F>(&mut self, index: usize, load: F) -> Result<&Bitmap, PhotoError>
    where
        F: FnOnce(usize) -> Result<Bitmap, PhotoError>,
    {
        if self.entries.contains_key(&index) {
            return Ok(&self.entries[&index]);
        }

        let bitmap = load(index)?;
        if self.entries.len() >= self.capacity
            && let Some((evicted, _)) = self.entries.pop_first()
        {
            log::debug!("gallery: evicted photo {}", evicted);
        }
        Ok(self.entries.entry(index).or_insert(bitmap))
    }

    /// Drops everything; indices shift after a delete or rescan.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
