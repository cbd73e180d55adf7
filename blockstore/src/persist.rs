use std::fs::OpenOptions;
use std::io::prelude::*;
use std::path::Path;

use crate::error::StoreError;
use crate::geometry::Geometry;
use crate::store::{BlockStore, BlockStoreBuilder};

/// Whole-image persistence.
///
/// An image file is the store's blocks written back to back, block 0 first,
/// with no header. Block 0 already holds the live bitmap, so the file carries
/// the allocation state exactly as it was in memory.
impl BlockStore {
    /// Writes the full store image to `path`, replacing any existing file, and
    /// syncs it to disk. Returns the number of bytes written.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let image = self.as_bytes();
        file.write_all(image)?;
        file.sync_all()?;

        info!(
            "Wrote {} bytes ({} blocks in use) to {}.",
            image.len(),
            self.used_blocks(),
            path.display()
        );
        Ok(image.len())
    }

    /// Loads a store with the default geometry from an image file.
    pub fn deserialize<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::deserialize_with(path, Geometry::default())
    }

    /// Loads a store from an image file written with the same geometry.
    ///
    /// At most one image worth of bytes is read. A shorter file is accepted
    /// and leaves the remaining bytes zeroed; the format has no way to tell
    /// truncation from a legitimately sparse image.
    pub fn deserialize_with<P: AsRef<Path>>(
        path: P,
        geometry: Geometry,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).open(path)?;

        let mut store = BlockStore::with_geometry(geometry)?;
        let image_len = geometry.image_bytes();
        let mut image = Vec::with_capacity(image_len);
        // Limit the read to a single image.
        file.take(image_len as u64).read_to_end(&mut image)?;
        if image.len() < image_len {
            warn!(
                "Image {} holds {} of {} bytes, remainder left zeroed.",
                path.display(),
                image.len(),
                image_len
            );
        }
        store.as_bytes_mut()[..image.len()].copy_from_slice(&image);

        info!(
            "Loaded {} ({} blocks in use).",
            path.display(),
            store.used_blocks()
        );
        Ok(store)
    }
}

impl BlockStoreBuilder {
    /// Loads a store from an image file using the configured geometry.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<BlockStore, StoreError> {
        BlockStore::deserialize_with(path, self.geometry()?)
    }
}
