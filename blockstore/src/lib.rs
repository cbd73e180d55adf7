//! A fixed-capacity block store.
//!
//! The store is a flat array of equally sized blocks. Block 0 is reserved for a
//! bitmap recording which of the remaining blocks are in use, so the whole store
//! can be written to and read back from a single image file with its allocation
//! state intact.
//!
//! ```
//! use blockstore::BlockStore;
//!
//! let mut store = BlockStore::create().unwrap();
//! let id = store.allocate().unwrap();
//! store.write(id, &[b'A'; 256]).unwrap();
//!
//! let mut buf = [0; 256];
//! assert_eq!(store.read(id, &mut buf).unwrap(), 256);
//! assert_eq!(store.used_blocks(), 1);
//! ```
#[macro_use]
extern crate log;

pub mod alloc;
mod error;
pub mod geometry;
mod persist;
mod store;

pub use crate::alloc::{BitArray, BitArrayMut, Bitmap, BitmapView};
pub use crate::error::{BitmapError, StoreError};
pub use crate::geometry::Geometry;
pub use crate::store::{BlockId, BlockStore, BlockStoreBuilder};
