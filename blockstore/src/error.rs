use crate::BlockId;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BitmapError {
    #[error("bitmap must track at least one bit")]
    Empty,
    #[error("bit {index} is out of range for a bitmap of {len} bits")]
    OutOfRange { index: usize, len: usize },
    #[error("buffer of {len} bytes cannot hold a bitmap of {need} bytes")]
    ShortBuffer { len: usize, need: usize },
    #[error("could not allocate {0} bitmap bytes")]
    OutOfMemory(usize),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid store geometry: {0}")]
    InvalidGeometry(String),
    #[error("block {0} is not a data block")]
    OutOfRange(BlockId),
    #[error("block {0} is not allocated")]
    NotAllocated(BlockId),
    #[error("buffer of {len} bytes is smaller than a {need} byte block")]
    ShortBuffer { len: usize, need: usize },
    #[error("could not allocate a {0} byte store image")]
    OutOfMemory(usize),
    #[error("invalid free block bitmap")]
    Bitmap(#[from] BitmapError),
    #[error("block store image i/o failed")]
    Io(#[from] std::io::Error),
}
