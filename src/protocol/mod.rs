//! Protocol layer: length-prefixed framing over bip buffers
//!
//! Design principles:
//! - Flat: a 4-byte length header, then the payload
//! - In place: frames are encoded straight into a write reservation
//! - Boundary-safe: decoding walks both regions, no compaction needed

mod frame;

pub use frame::{complete_len, decode, encode, peek_len, FrameError, FRAME_HEADER_SIZE, MAX_FRAME_LEN};
