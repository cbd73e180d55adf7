use crate::alloc::bytes_for;
use crate::error::StoreError;

/// Block count used by [`Geometry::default`]. Block 0 holds the bitmap, leaving
/// 255 data blocks.
pub const DEFAULT_BLOCK_COUNT: usize = 256;
/// Block size in bytes used by [`Geometry::default`].
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// The shape of a block store: how many blocks it has and how large each one is.
///
/// Two stores only interchange image files when their geometries match, since
/// the on-disk format carries no header.
///
/// # Layout
/// ==================================================================
/// | Block 0 (bitmap + padding) | Block 1 | Block 2 | ... | Block N-1 |
/// ==================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    block_count: usize,
    block_size: usize,
}

impl Geometry {
    pub fn new(block_count: usize, block_size: usize) -> Result<Self, StoreError> {
        if block_count < 2 {
            return Err(StoreError::InvalidGeometry(format!(
                "need at least 2 blocks, got {}",
                block_count
            )));
        }
        if block_size == 0 {
            return Err(StoreError::InvalidGeometry(
                "block size must be non-zero".to_string(),
            ));
        }
        let bitmap_bytes = bytes_for(block_count - 1);
        if bitmap_bytes > block_size {
            return Err(StoreError::InvalidGeometry(format!(
                "a {} byte bitmap does not fit in a {} byte block",
                bitmap_bytes, block_size
            )));
        }
        match block_count.checked_mul(block_size) {
            Some(image) if image <= isize::MAX as usize => (),
            _ => {
                return Err(StoreError::InvalidGeometry(format!(
                    "{} blocks of {} bytes overflow the address space",
                    block_count, block_size
                )))
            }
        }
        Ok(Self {
            block_count,
            block_size,
        })
    }

    /// Total blocks including the metadata block.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks available to callers, i.e. every block but block 0.
    pub fn total_blocks(&self) -> usize {
        self.block_count - 1
    }

    /// Bytes at the front of block 0 occupied by the bitmap.
    pub fn bitmap_bytes(&self) -> usize {
        bytes_for(self.total_blocks())
    }

    /// Size of the whole store image, in memory and on disk.
    pub fn image_bytes(&self) -> usize {
        self.block_count * self.block_size
    }

    /// Byte offset of `block` within the image.
    pub(crate) fn offset(&self, block: usize) -> usize {
        block * self.block_size
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}
