//! bipbuf - Bipartite Circular Buffer
//!
//! Architecture:
//! - Region tracking: at most two live regions over one flat store
//! - Contiguous I/O: writers get one flat reservation, readers one flat span
//! - Pluggable storage: heap, memory-mapped file or caller-owned memory
//! - Staging: SPSC handles, length-prefixed framing and a mio echo server
//!
//! ```
//! use bipbuf::core::BipBuffer;
//!
//! let mut buf = BipBuffer::new(8).unwrap();
//!
//! let dst = buf.write_acquire().unwrap();
//! dst[..5].copy_from_slice(b"hello");
//! buf.write_release(5);
//!
//! assert_eq!(buf.read_acquire(), Some(&b"hello"[..]));
//! buf.read_release(5);
//! assert!(buf.is_empty());
//! ```

pub mod core;
pub mod network;
pub mod protocol;

pub use crate::core::{BipBuffer, BufferOptions, Consumer, Error, Producer};
