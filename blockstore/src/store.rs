use crate::alloc::{BitArray, BitArrayMut, Bitmap, BitmapView};
use crate::error::StoreError;
use crate::geometry::{Geometry, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE};

/// Identifies a data block. Valid ids run from 1 to `total_blocks()`; block 0
/// is the store's own metadata and is never handed out.
pub type BlockId = usize;

/// A fixed array of equally sized blocks with a free block bitmap kept in
/// block 0.
///
/// Bit `id - 1` of the bitmap is set exactly when data block `id` is in use.
/// The bitmap is never held anywhere but block 0: each operation lays a
/// [`BitmapView`] over those bytes, so every change is committed the moment it
/// is made and the in-memory image is always ready to be written to disk as is.
///
/// Not safe for shared use. Every mutation takes `&mut self`, so callers that
/// need to share a store must serialize access themselves.
#[derive(Debug)]
pub struct BlockStore {
    geometry: Geometry,
    /// Every block back to back, block 0 first.
    blocks: Vec<u8>,
}

impl BlockStore {
    /// Creates an empty store with the default 256 x 256 byte geometry.
    pub fn create() -> Result<Self, StoreError> {
        Self::with_geometry(Geometry::default())
    }

    /// Creates an empty store. All blocks are zeroed and block 0 receives a
    /// freshly built bitmap with no blocks in use.
    pub fn with_geometry(geometry: Geometry) -> Result<Self, StoreError> {
        let image_bytes = geometry.image_bytes();
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(image_bytes)
            .map_err(|_| StoreError::OutOfMemory(image_bytes))?;
        blocks.resize(image_bytes, 0);
        let bitmap = Bitmap::new(geometry.total_blocks())?;
        blocks[..geometry.bitmap_bytes()].copy_from_slice(bitmap.as_bytes());

        info!(
            "Created block store of {} blocks x {} bytes.",
            geometry.block_count(),
            geometry.block_size()
        );
        Ok(Self { geometry, blocks })
    }

    /// Tears the store down, releasing its memory. Dropping the store does the
    /// same; this exists for callers that want the teardown to be explicit.
    pub fn destroy(self) {
        debug!(
            "Destroying block store with {} blocks in use.",
            self.used_blocks()
        );
    }

    /// Claims the lowest numbered free block.
    ///
    /// Returns `None` when every data block is in use. That is the steady state
    /// of a full store and not an error.
    pub fn allocate(&mut self) -> Option<BlockId> {
        let mut bitmap = self.bitmap_mut();
        let bit = match bitmap.ffz() {
            Some(bit) => bit,
            None => {
                debug!("Block store is full.");
                return None;
            }
        };
        bitmap.set(bit).ok()?;
        debug!("Allocated block {}.", bit + 1);
        Some(bit + 1)
    }

    /// Claims a specific block. Returns `false`, leaving the store untouched,
    /// if `id` is not a data block or is already in use.
    pub fn request(&mut self, id: BlockId) -> bool {
        let bit = match self.bit_for(id) {
            Some(bit) => bit,
            None => return false,
        };
        let mut bitmap = self.bitmap_mut();
        if bitmap.test(bit) {
            debug!("Block {} requested but already in use.", id);
            return false;
        }
        bitmap.set(bit).is_ok()
    }

    /// Marks a block free. Releasing a free block or an invalid id does
    /// nothing. The block's bytes are left as they are.
    pub fn release(&mut self, id: BlockId) {
        if let Some(bit) = self.bit_for(id) {
            let mut bitmap = self.bitmap_mut();
            if bitmap.test(bit) && bitmap.reset(bit).is_ok() {
                debug!("Released block {}.", id);
            }
        }
    }

    /// Copies block `id` into the front of `buf` and returns the number of bytes
    /// copied, which is always the block size.
    ///
    /// # Errors
    ///
    /// Fails without touching `buf` if `id` is not a data block, if `buf` is
    /// shorter than a block, or if the block is not in use.
    pub fn read(&self, id: BlockId, buf: &mut [u8]) -> Result<usize, StoreError> {
        let bit = self.bit_for(id).ok_or(StoreError::OutOfRange(id))?;
        let size = self.check_buffer(buf.len())?;
        if !self.bitmap().test(bit) {
            return Err(StoreError::NotAllocated(id));
        }
        buf[..size].copy_from_slice(self.block(id));
        Ok(size)
    }

    /// Copies the front of `buf` into block `id` and marks the block in use,
    /// whatever its previous state. Use [`BlockStore::request`] first when the
    /// write must not land on a block someone else holds.
    ///
    /// # Errors
    ///
    /// Fails without touching the store if `id` is not a data block or `buf`
    /// is shorter than a block.
    pub fn write(&mut self, id: BlockId, buf: &[u8]) -> Result<usize, StoreError> {
        let bit = self.bit_for(id).ok_or(StoreError::OutOfRange(id))?;
        let size = match self.check_buffer(buf.len()) {
            Ok(size) => size,
            Err(e) => {
                warn!("Rejected write to block {}: {}", id, e);
                return Err(e);
            }
        };
        self.block_mut(id).copy_from_slice(&buf[..size]);
        self.bitmap_mut().set(bit)?;
        Ok(size)
    }

    /// Returns whether block `id` is a data block currently in use.
    pub fn is_allocated(&self, id: BlockId) -> bool {
        match self.bit_for(id) {
            Some(bit) => self.bitmap().test(bit),
            None => false,
        }
    }

    pub fn used_blocks(&self) -> usize {
        self.bitmap().total_set()
    }

    pub fn free_blocks(&self) -> usize {
        self.total_blocks() - self.used_blocks()
    }

    /// The number of data blocks, which excludes the metadata block.
    pub fn total_blocks(&self) -> usize {
        self.geometry.total_blocks()
    }

    /// The number of data blocks in a store with the default geometry.
    pub const fn default_total_blocks() -> usize {
        DEFAULT_BLOCK_COUNT - 1
    }

    /// Ids of the blocks in use, lowest first.
    pub fn used_block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.bitmap().into_iter().map(|bit| bit + 1)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The raw store image, block 0 included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blocks
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.blocks
    }

    /// Maps a block id to its bitmap index, rejecting block 0 and ids past the
    /// end of the store.
    fn bit_for(&self, id: BlockId) -> Option<usize> {
        if id == 0 || id > self.geometry.total_blocks() {
            return None;
        }
        Some(id - 1)
    }

    fn check_buffer(&self, len: usize) -> Result<usize, StoreError> {
        let need = self.geometry.block_size();
        if len < need {
            return Err(StoreError::ShortBuffer { len, need });
        }
        Ok(need)
    }

    fn bitmap(&self) -> BitmapView<&[u8]> {
        let len = self.geometry.bitmap_bytes();
        BitmapView::over(&self.blocks[..len], self.geometry.total_blocks())
    }

    fn bitmap_mut(&mut self) -> BitmapView<&mut [u8]> {
        let len = self.geometry.bitmap_bytes();
        let bits = self.geometry.total_blocks();
        BitmapView::over(&mut self.blocks[..len], bits)
    }

    fn block(&self, id: BlockId) -> &[u8] {
        let start = self.geometry.offset(id);
        &self.blocks[start..start + self.geometry.block_size()]
    }

    fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        let start = self.geometry.offset(id);
        let end = start + self.geometry.block_size();
        &mut self.blocks[start..end]
    }
}

/// Configures the geometry of a [`BlockStore`] before creating or loading it.
///
/// ```
/// use blockstore::BlockStoreBuilder;
///
/// let store = BlockStoreBuilder::new()
///     .with_block_count(16)
///     .with_block_size(64)
///     .build()
///     .unwrap();
/// assert_eq!(store.total_blocks(), 15);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BlockStoreBuilder {
    block_count: usize,
    block_size: usize,
}

impl BlockStoreBuilder {
    pub fn new() -> Self {
        Self {
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Sets the total number of blocks, metadata block included.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.block_count = blocks;
        self
    }

    /// Sets the size of each block in bytes.
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    pub fn geometry(&self) -> Result<Geometry, StoreError> {
        Geometry::new(self.block_count, self.block_size)
    }

    /// Creates an empty store with the configured geometry.
    pub fn build(self) -> Result<BlockStore, StoreError> {
        BlockStore::with_geometry(self.geometry()?)
    }
}

impl Default for BlockStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Geometry> for BlockStoreBuilder {
    fn from(geometry: Geometry) -> Self {
        Self {
            block_count: geometry.block_count(),
            block_size: geometry.block_size(),
        }
    }
}
