//! Connection handling with bip-buffer staging
//!
//! Socket reads land directly in a write reservation of the read buffer and
//! socket writes are served straight from the write buffer's readable
//! region. Neither side ever compacts: leftover bytes simply wrap.

use std::io::{self, Read, Write};

use mio::net::TcpStream;
use tracing::warn;

use crate::core::{BipBuffer, BufferOptions};
use crate::protocol::{self, FrameError, FRAME_HEADER_SIZE};

/// Default staging buffer size.
///
/// A frame is only guaranteed to complete in a read buffer at least twice
/// its encoded size: once the buffer wraps, the tail behind region A is out
/// of reach until A drains. 256KB covers `MAX_FRAME_LEN`.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024; // 256KB

/// Kernel socket buffer size requested for accepted connections
#[cfg(unix)]
const SOCKET_BUFFER_SIZE: libc::c_int = 256 * 1024; // 256KB

/// Stream wrapper with pre-allocated read and write staging buffers.
pub struct Connection<T = TcpStream> {
    stream: T,
    read_buffer: BipBuffer,
    write_buffer: BipBuffer,
    eof: bool,
}

impl Connection<TcpStream> {
    /// Wraps an accepted non-blocking TCP stream.
    pub fn tcp(stream: TcpStream, capacity: usize, options: BufferOptions) -> io::Result<Self> {
        // Disable Nagle's algorithm for lower latency
        stream.set_nodelay(true)?;

        // Not every platform honours this, so failures are only logged
        #[cfg(unix)]
        {
            if let Err(e) = set_socket_buffers(&stream, SOCKET_BUFFER_SIZE) {
                warn!(error = %e, "failed to size socket buffers");
            }
        }

        Self::from_stream(stream, capacity, options)
    }
}

impl<T: Read + Write> Connection<T> {
    /// Wraps any non-blocking byte stream. Both staging buffers get
    /// `capacity` bytes.
    pub fn from_stream(stream: T, capacity: usize, options: BufferOptions) -> io::Result<Self> {
        Ok(Self {
            stream,
            read_buffer: BipBuffer::with_options(capacity, options)?,
            write_buffer: BipBuffer::with_options(capacity, options)?,
            eof: false,
        })
    }

    /// Reads from the stream until it would block, the read buffer is full
    /// or the peer closes.
    ///
    /// Returns the number of bytes read by this call.
    pub fn fill_read_buffer(&mut self) -> io::Result<usize> {
        let mut total = 0;

        while !self.eof {
            let Some(dst) = self.read_buffer.write_acquire() else {
                break;
            };

            match self.stream.read(dst) {
                Ok(0) => {
                    self.read_buffer.write_release(0);
                    self.eof = true;
                }
                Ok(n) => {
                    self.read_buffer.write_release(n);
                    total += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.read_buffer.write_release(0);
                    break;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.read_buffer.write_release(0);
                }
                Err(e) => {
                    self.read_buffer.write_release(0);
                    return Err(e);
                }
            }
        }

        Ok(total)
    }

    /// Oldest contiguous received bytes (zero-copy). May be shorter than
    /// [`pending_read`](Self::pending_read) once the buffer has wrapped.
    #[inline(always)]
    pub fn readable(&self) -> &[u8] {
        self.read_buffer.read_acquire().unwrap_or(&[])
    }

    /// Consume n bytes from the read buffer
    ///
    /// # Panics
    /// Panics if `n` exceeds [`pending_read`](Self::pending_read).
    #[inline(always)]
    pub fn consume(&mut self, n: usize) {
        self.read_buffer.consume(n);
    }

    /// Received bytes not yet consumed.
    #[inline(always)]
    pub fn pending_read(&self) -> usize {
        self.read_buffer.len()
    }

    /// Pops the next complete frame into `out`.
    pub fn decode_frame(&mut self, out: &mut Vec<u8>) -> io::Result<bool> {
        Ok(protocol::decode(&mut self.read_buffer, out)?)
    }

    /// Payload length of the next received frame, once it is complete.
    pub fn next_frame_len(&self) -> io::Result<Option<usize>> {
        Ok(protocol::complete_len(&self.read_buffer)?)
    }

    /// Whether a frame with a `len` byte payload can be queued right now
    /// without flushing.
    #[inline(always)]
    pub fn can_queue_frame(&self, len: usize) -> bool {
        self.write_buffer.write_available() >= FRAME_HEADER_SIZE + len
    }

    /// Queues `data` for writing, flushing first when short of room.
    ///
    /// Returns the number of bytes accepted, which is less than
    /// `data.len()` only when the socket is backed up.
    pub fn queue_write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.write_buffer.write_available() < data.len() {
            self.flush_write_buffer()?;
        }
        Ok(self.write_buffer.write(data))
    }

    /// Queues one frame. Fails with `WouldBlock` when it does not fit even
    /// after flushing.
    pub fn queue_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        match protocol::encode(&mut self.write_buffer, payload) {
            Err(FrameError::NoSpace { .. }) => {
                self.flush_write_buffer()?;
                Ok(protocol::encode(&mut self.write_buffer, payload)?)
            }
            result => Ok(result?),
        }
    }

    /// Writes queued bytes until the stream would block or the buffer is
    /// empty.
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        loop {
            let Some(src) = self.write_buffer.read_acquire() else {
                return Ok(());
            };

            match self.stream.write(src) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "Failed to write to socket",
                    ));
                }
                Ok(n) => self.write_buffer.read_release(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Bytes pending in write buffer
    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_buffer.len()
    }

    /// `true` once the peer has closed its side.
    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// No room left to receive into. Once every complete frame has been
    /// decoded this means the connection cannot make progress, which only
    /// happens for frames larger than half the read buffer.
    pub fn is_stalled(&self) -> bool {
        self.read_buffer.write_available() == 0
    }

    pub fn stream(&self) -> &T {
        &self.stream
    }

    /// Underlying stream for registering with a poller
    pub fn stream_mut(&mut self) -> &mut T {
        &mut self.stream
    }
}

#[cfg(unix)]
fn set_socket_buffers<S: std::os::unix::io::AsRawFd>(stream: &S, size: libc::c_int) -> io::Result<()> {
    let fd = stream.as_raw_fd();

    for option in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: `fd` belongs to a live socket borrowed for this call and
        // `size` outlives it.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                option,
                &size as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory non-blocking stream: reads serve queued chunks then block,
    /// writes accept up to `write_budget` bytes then block.
    #[derive(Default)]
    struct MockStream {
        incoming: VecDeque<Vec<u8>>,
        closed: bool,
        written: Vec<u8>,
        write_budget: usize,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.incoming.front_mut() else {
                if self.closed {
                    return Ok(0);
                }
                return Err(io::ErrorKind::WouldBlock.into());
            };

            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            chunk.drain(..n);
            if chunk.is_empty() {
                self.incoming.pop_front();
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.write_budget == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.write_budget);
            self.write_budget -= n;
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connection(stream: MockStream, capacity: usize) -> Connection<MockStream> {
        Connection::from_stream(stream, capacity, BufferOptions::default()).unwrap()
    }

    #[test]
    fn test_fill_and_consume() {
        let mut stream = MockStream::default();
        stream.incoming.push_back(b"hello ".to_vec());
        stream.incoming.push_back(b"world".to_vec());
        let mut conn = connection(stream, 64);

        assert_eq!(conn.fill_read_buffer().unwrap(), 11);
        assert_eq!(conn.readable(), b"hello world");

        conn.consume(6);
        assert_eq!(conn.readable(), b"world");
        conn.consume(5);
        assert_eq!(conn.pending_read(), 0);
        assert!(!conn.is_eof());
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn test_consume_past_pending_panics() {
        let mut stream = MockStream::default();
        stream.incoming.push_back(b"abc".to_vec());
        let mut conn = connection(stream, 16);

        conn.fill_read_buffer().unwrap();
        conn.consume(4);
    }

    #[test]
    fn test_next_frame_len_waits_for_whole_frame() {
        let mut stream = MockStream::default();
        stream.incoming.push_back(vec![5, 0, 0, 0, b'a', b'b']);
        let mut conn = connection(stream, 32);

        conn.fill_read_buffer().unwrap();
        assert_eq!(conn.next_frame_len().unwrap(), None);

        conn.stream_mut().incoming.push_back(b"cde".to_vec());
        conn.fill_read_buffer().unwrap();
        assert_eq!(conn.next_frame_len().unwrap(), Some(5));
        assert_eq!(conn.pending_read(), 9);
    }

    #[test]
    fn test_can_queue_frame_tracks_write_space() {
        let mut conn = connection(MockStream::default(), 16);
        assert!(conn.can_queue_frame(12));
        assert!(!conn.can_queue_frame(13));

        conn.queue_frame(b"12345678").unwrap();
        assert!(conn.can_queue_frame(0));
        assert!(!conn.can_queue_frame(1));
    }

    #[test]
    fn test_fill_stops_when_full() {
        let mut stream = MockStream::default();
        stream.incoming.push_back(vec![7u8; 20]);
        let mut conn = connection(stream, 8);

        assert_eq!(conn.fill_read_buffer().unwrap(), 8);
        assert!(conn.is_stalled());

        conn.consume(8);
        assert_eq!(conn.fill_read_buffer().unwrap(), 8);
        conn.consume(8);
        assert_eq!(conn.fill_read_buffer().unwrap(), 4);
    }

    #[test]
    fn test_eof() {
        let mut stream = MockStream::default();
        stream.incoming.push_back(b"bye".to_vec());
        stream.closed = true;
        let mut conn = connection(stream, 16);

        assert_eq!(conn.fill_read_buffer().unwrap(), 3);
        assert!(conn.is_eof());
        assert_eq!(conn.readable(), b"bye");
    }

    #[test]
    fn test_frames_across_chunks() {
        let mut stream = MockStream::default();
        let mut wire = Vec::new();
        for payload in [&b"one"[..], b"two", b"three"] {
            wire.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            wire.extend_from_slice(payload);
        }
        for chunk in wire.chunks(5) {
            stream.incoming.push_back(chunk.to_vec());
        }
        let mut conn = connection(stream, 16);

        let mut frames = Vec::new();
        loop {
            let read = conn.fill_read_buffer().unwrap();
            let mut out = Vec::new();
            while conn.decode_frame(&mut out).unwrap() {
                frames.push(std::mem::take(&mut out));
            }
            if read == 0 {
                break;
            }
        }

        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn test_partial_flush() {
        let stream = MockStream {
            write_budget: 4,
            ..Default::default()
        };
        let mut conn = connection(stream, 32);

        assert_eq!(conn.queue_write(b"abcdefgh").unwrap(), 8);
        conn.flush_write_buffer().unwrap();
        assert_eq!(conn.write_pending(), 4);
        assert_eq!(conn.stream().written, b"abcd");

        conn.stream_mut().write_budget = 100;
        conn.flush_write_buffer().unwrap();
        assert_eq!(conn.write_pending(), 0);
        assert_eq!(conn.stream().written, b"abcdefgh");
    }

    #[test]
    fn test_queue_frame_flushes_when_full() {
        let stream = MockStream {
            write_budget: usize::MAX,
            ..Default::default()
        };
        let mut conn = connection(stream, 16);

        conn.queue_frame(b"12345678").unwrap();
        conn.queue_frame(b"abcdefgh").unwrap();
        conn.flush_write_buffer().unwrap();

        let written = &conn.stream().written;
        assert_eq!(written.len(), 24);
        assert_eq!(&written[4..12], b"12345678");
        assert_eq!(&written[16..], b"abcdefgh");
    }

    #[test]
    fn test_queue_frame_would_block() {
        let mut conn = connection(MockStream::default(), 16);

        conn.queue_frame(b"12345678").unwrap();
        let err = conn.queue_frame(b"abcdefgh").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
