//! Network Layer: bip-buffer staged socket I/O
//!
//! Uses mio for cross-platform non-blocking I/O.
//!
//! Features:
//! - Socket reads go straight into a write reservation (no compaction)
//! - Frames are encoded in place into the outgoing buffer
//! - Edge-triggered event loop with per-connection staging buffers

mod connection;
mod server;

pub use connection::{Connection, DEFAULT_BUFFER_SIZE};
pub use server::{Server, ServerConfig, ServerStats};
