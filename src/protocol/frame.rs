//! Length-prefixed frames staged through a bip buffer
//!
//! Layout:
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ payload length (u32, LE)     │ payload (max 64KB)           │
//! └──────────────────────────────┴──────────────────────────────┘
//!
//! Encoding writes a whole frame into one reservation. Bytes arriving from
//! a socket are committed in arbitrary chunks, so a received frame may
//! straddle regions A and B; decoding reads through both.

use std::io;

use thiserror::Error;

use crate::core::{BipBuffer, Storage};

pub const FRAME_HEADER_SIZE: usize = 4;
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Payload longer than [`MAX_FRAME_LEN`] or than the buffer can ever hold
    #[error("frame payload of {len} bytes is too large")]
    TooLarge { len: usize },

    /// Not enough contiguous room for the whole frame right now
    #[error("frame needs {needed} contiguous bytes, {available} available")]
    NoSpace { needed: usize, available: usize },
}

impl From<FrameError> for io::Error {
    fn from(e: FrameError) -> Self {
        let kind = match e {
            FrameError::TooLarge { .. } => io::ErrorKind::InvalidData,
            FrameError::NoSpace { .. } => io::ErrorKind::WouldBlock,
        };
        io::Error::new(kind, e)
    }
}

/// Appends one frame carrying `payload`.
pub fn encode<S: Storage>(buffer: &mut BipBuffer<S>, payload: &[u8]) -> Result<(), FrameError> {
    let total = FRAME_HEADER_SIZE + payload.len();
    if payload.len() > MAX_FRAME_LEN || total > buffer.capacity() {
        return Err(FrameError::TooLarge {
            len: payload.len(),
        });
    }

    let available = buffer.write_available();
    if available < total {
        return Err(FrameError::NoSpace {
            needed: total,
            available,
        });
    }

    let dst = buffer
        .write_acquire()
        .ok_or(FrameError::NoSpace { needed: total, available: 0 })?;
    dst[..FRAME_HEADER_SIZE].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    dst[FRAME_HEADER_SIZE..total].copy_from_slice(payload);
    buffer.write_release(total);

    Ok(())
}

/// Payload length of the frame at the front, once its header has arrived.
pub fn peek_len<S: Storage>(buffer: &BipBuffer<S>) -> Option<usize> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    if buffer.copy_out(0, &mut header) < FRAME_HEADER_SIZE {
        return None;
    }
    Some(u32::from_le_bytes(header) as usize)
}

/// Moves the front frame's payload onto the end of `out` and consumes the
/// frame.
///
/// Returns `Ok(false)` and leaves everything untouched while the frame is
/// still incomplete.
pub fn decode<S: Storage>(buffer: &mut BipBuffer<S>, out: &mut Vec<u8>) -> Result<bool, FrameError> {
    let Some(len) = complete_len(buffer)? else {
        return Ok(false);
    };

    let start = out.len();
    out.resize(start + len, 0);
    buffer.copy_out(FRAME_HEADER_SIZE, &mut out[start..]);
    buffer.consume(FRAME_HEADER_SIZE + len);

    Ok(true)
}

/// Payload length of the front frame once every byte of it has arrived.
///
/// Fails with [`FrameError::TooLarge`] as soon as the header announces a
/// frame this buffer can never hold.
pub fn complete_len<S: Storage>(buffer: &BipBuffer<S>) -> Result<Option<usize>, FrameError> {
    let Some(len) = peek_len(buffer) else {
        return Ok(None);
    };

    let total = FRAME_HEADER_SIZE + len;
    if len > MAX_FRAME_LEN || total > buffer.capacity() {
        return Err(FrameError::TooLarge { len });
    }

    Ok((buffer.len() >= total).then_some(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_single() {
        let mut buffer = BipBuffer::new(64).unwrap();

        encode(&mut buffer, b"Hello, bip!").unwrap();
        assert_eq!(peek_len(&buffer), Some(11));

        let mut out = Vec::new();
        assert!(decode(&mut buffer, &mut out).unwrap());
        assert_eq!(out, b"Hello, bip!");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_frame_is_left_alone() {
        let mut buffer = BipBuffer::new(64).unwrap();
        buffer.write(&10u32.to_le_bytes());
        buffer.write(b"abc");

        let mut out = Vec::new();
        assert!(!decode(&mut buffer, &mut out).unwrap());
        assert!(out.is_empty());
        assert_eq!(buffer.len(), 7);

        buffer.write(b"defghij");
        assert!(decode(&mut buffer, &mut out).unwrap());
        assert_eq!(out, b"abcdefghij");
    }

    #[test]
    fn test_frame_straddling_regions() {
        let mut buffer = BipBuffer::new(16).unwrap();

        // Tail and head both have 5 free bytes: the frame fills the tail
        // first and wraps for the rest
        buffer.write(&[0u8; 11]);
        buffer.consume(5);

        let mut frame = Vec::new();
        frame.extend_from_slice(&6u32.to_le_bytes());
        frame.extend_from_slice(b"split!");
        assert_eq!(buffer.write(&frame), 10);
        assert_eq!(buffer.regions().b.len, 5);

        buffer.consume(6);
        assert_eq!(buffer.read_available(), 5);

        let mut out = Vec::new();
        assert_eq!(peek_len(&buffer), Some(6));
        assert!(decode(&mut buffer, &mut out).unwrap());
        assert_eq!(out, b"split!");
    }

    #[test]
    fn test_encode_no_space() {
        let mut buffer = BipBuffer::new(16).unwrap();
        encode(&mut buffer, &[1u8; 8]).unwrap();

        assert_eq!(
            encode(&mut buffer, &[2u8; 8]),
            Err(FrameError::NoSpace {
                needed: 12,
                available: 4
            })
        );
    }

    #[test]
    fn test_too_large() {
        let mut buffer = BipBuffer::new(16).unwrap();
        assert_eq!(
            encode(&mut buffer, &[0u8; 13]),
            Err(FrameError::TooLarge { len: 13 })
        );

        buffer.write(&1000u32.to_le_bytes());
        let mut out = Vec::new();
        assert_eq!(
            decode(&mut buffer, &mut out),
            Err(FrameError::TooLarge { len: 1000 })
        );
    }

    #[test]
    fn test_error_messages_and_kinds() {
        let e = FrameError::NoSpace {
            needed: 12,
            available: 4,
        };
        assert_eq!(e.to_string(), "frame needs 12 contiguous bytes, 4 available");
        assert_eq!(io::Error::from(e).kind(), io::ErrorKind::WouldBlock);

        let e = FrameError::TooLarge { len: 70000 };
        assert_eq!(e.to_string(), "frame payload of 70000 bytes is too large");
        assert_eq!(io::Error::from(e).kind(), io::ErrorKind::InvalidData);
    }
}
