//! Frame echo server with event-driven I/O
//!
//! Uses mio for non-blocking I/O multiplexing. Every accepted connection
//! gets a pair of bip buffers: received bytes are decoded into frames in
//! place and each frame is queued straight back to its sender.
//!
//! A frame is only taken off the read buffer once its echo fits in the
//! write buffer. Until then the connection stops reading, so a peer that
//! does not drain its echoes is throttled by TCP instead of losing frames.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use super::connection::{Connection, DEFAULT_BUFFER_SIZE};
use crate::core::BufferOptions;

const SERVER_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 1024;
const POLL_TIMEOUT: Duration = Duration::from_millis(10);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Size of each connection's read and write buffer
    pub buffer_capacity: usize,
    /// Wipe consumed bytes and fresh buffers
    pub zero_fill: bool,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9999".to_string(),
            buffer_capacity: DEFAULT_BUFFER_SIZE,
            zero_fill: false,
            max_connections: 1024,
        }
    }
}

impl ServerConfig {
    pub fn buffer_options(&self) -> BufferOptions {
        if self.zero_fill {
            BufferOptions::zeroing()
        } else {
            BufferOptions::default()
        }
    }
}

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    pub bytes_received: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_echoed: AtomicU64,
    /// Times a connection stopped reading because its echoes backed up
    pub write_stalls: AtomicU64,
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
}

impl ServerStats {
    fn log(&self, uptime: Duration) {
        let frames_in = self.frames_received.load(Ordering::Relaxed);
        let rate_in = frames_in as f64 / uptime.as_secs_f64();

        info!(
            uptime_secs = uptime.as_secs(),
            frames_in,
            rate_in,
            frames_out = self.frames_echoed.load(Ordering::Relaxed),
            write_stalls = self.write_stalls.load(Ordering::Relaxed),
            kb_in = self.bytes_received.load(Ordering::Relaxed) / 1024,
            connections = self.connections_active.load(Ordering::Relaxed),
            "server stats"
        );
    }
}

/// Event-driven echo server
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    config: ServerConfig,
    stats: ServerStats,
    // Reused frame payload buffer
    scratch: Vec<u8>,
}

impl Server {
    /// Binds the listener and registers it with a fresh poller.
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let addr: SocketAddr = config
            .bind_addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, SERVER_TOKEN, Interest::READABLE)?;

        info!(addr = %listener.local_addr()?, capacity = config.buffer_capacity, "server bound");

        Ok(Self {
            poll,
            listener,
            connections: HashMap::with_capacity(config.max_connections),
            next_token: 1,
            config,
            stats: ServerStats::default(),
            scratch: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Runs the event loop forever.
    pub fn run(&mut self) -> io::Result<()> {
        self.run_until(&AtomicBool::new(false))
    }

    /// Runs the event loop until `stop` is set.
    pub fn run_until(&mut self, stop: &AtomicBool) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let start_time = Instant::now();
        let mut last_stats = Instant::now();

        while !stop.load(Ordering::Acquire) {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                match event.token() {
                    SERVER_TOKEN => self.accept_connections()?,
                    token => {
                        if event.is_readable() {
                            self.handle_read(token);
                        }
                        if event.is_writable() {
                            self.handle_write(token);
                        }
                    }
                }
            }

            if last_stats.elapsed() > STATS_INTERVAL {
                self.stats.log(start_time.elapsed());
                last_stats = Instant::now();
            }
        }

        info!(connections = self.connections.len(), "server stopping");
        Ok(())
    }

    /// Accept new connections
    fn accept_connections(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if self.connections.len() >= self.config.max_connections {
                        warn!(%addr, "max connections reached, rejecting");
                        continue;
                    }

                    let mut conn = match Connection::tcp(
                        stream,
                        self.config.buffer_capacity,
                        self.config.buffer_options(),
                    ) {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(%addr, error = %e, "failed to set up connection");
                            continue;
                        }
                    };

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    self.poll.registry().register(
                        conn.stream_mut(),
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    )?;

                    self.connections.insert(token, conn);
                    self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                    self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
                    info!(%addr, token = token.0, "connection accepted");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Handle readable event
    fn handle_read(&mut self, token: Token) {
        self.pump(token, "read error");
    }

    /// Handle writable event. Flushing may free room for echoes that were
    /// held back, so reading resumes from here as well.
    fn handle_write(&mut self, token: Token) {
        self.pump(token, "write error");
    }

    fn pump(&mut self, token: Token, context: &'static str) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        let close = match echo_frames(conn, &mut self.scratch, &self.stats) {
            Ok(close) => close,
            Err(e) => {
                warn!(token = token.0, error = %e, "{}", context);
                true
            }
        };

        if close {
            self.close(token);
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!(token = token.0, error = %e, "deregister failed");
            }
            self.stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            info!(
                token = token.0,
                unsent = conn.write_pending(),
                "connection closed"
            );
        }
    }
}

/// Echoes every complete frame that fits and keeps reading the socket
/// while nothing is held back. Returns `true` when the connection should be
/// closed.
///
/// Stopping before the socket would block is safe with edge-triggered
/// events: the writable event that follows a flush calls back in here and
/// reading picks up where it left off.
fn echo_frames(conn: &mut Connection, scratch: &mut Vec<u8>, stats: &ServerStats) -> io::Result<bool> {
    loop {
        let mut held_back = false;

        while let Some(len) = conn.next_frame_len()? {
            if !conn.can_queue_frame(len) {
                conn.flush_write_buffer()?;
                if !conn.can_queue_frame(len) {
                    held_back = true;
                    break;
                }
            }

            scratch.clear();
            conn.decode_frame(scratch)?;
            stats.frames_received.fetch_add(1, Ordering::Relaxed);
            conn.queue_frame(scratch)?;
            stats.frames_echoed.fetch_add(1, Ordering::Relaxed);
        }

        conn.flush_write_buffer()?;

        if held_back {
            stats.write_stalls.fetch_add(1, Ordering::Relaxed);
            debug!(unsent = conn.write_pending(), "echoes backed up, reading paused");
            return Ok(false);
        }

        if conn.is_eof() {
            // Half-closed peers still get their echoes
            let unsent = conn.write_pending();
            debug!(pending = conn.pending_read(), unsent, "peer closed");
            return Ok(unsent == 0);
        }

        let read = conn.fill_read_buffer()?;
        stats
            .bytes_received
            .fetch_add(read as u64, Ordering::Relaxed);

        if read == 0 && !conn.is_eof() {
            if conn.is_stalled() {
                warn!(pending = conn.pending_read(), "frame larger than half the read buffer");
                return Ok(true);
            }
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_buffer_options() {
        let config = ServerConfig::default();
        assert_eq!(config.buffer_options(), BufferOptions::default());

        let config = ServerConfig {
            zero_fill: true,
            ..Default::default()
        };
        assert_eq!(config.buffer_options(), BufferOptions::zeroing());
    }

    #[test]
    fn test_bind_rejects_bad_address() {
        let config = ServerConfig {
            bind_addr: "not an address".to_string(),
            ..Default::default()
        };
        let err = Server::bind(config).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let server = Server::bind(config).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
