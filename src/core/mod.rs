//! Core module: bip buffer region tracking and its backing stores
//!
//! Design principles:
//! - Contiguous: every write and every read is one flat slice
//! - No compaction: wrapped data waits at the head until the tail drains
//! - No allocation after init: the store is sized once and never grows
//! - No locking in the tracker: concurrency lives in `spsc`

mod bip_buffer;
mod error;
mod mmap_storage;
mod options;
mod region;
mod spsc;
mod storage;

pub use bip_buffer::BipBuffer;
pub use error::Error;
pub use mmap_storage::MmapStorage;
pub use options::BufferOptions;
pub use region::{Region, Regions};
pub use spsc::{Consumer, Producer};
pub use storage::{HeapStorage, Storage};
