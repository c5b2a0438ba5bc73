//! Local TCP command listener.
//!
//! Line-delimited request/response over plain TCP:
//!
//! ```text
//! client ──▶ {"solenoids":[1,0,1],"duration":500}\n
//! client ◀── Now spraying!\n
//! ```
//!
//! ## Connection model
//!
//! 1. [`LocalListener::bind`] opens a non-blocking listener.
//! 2. [`LocalListener::serve_next`] polls for one waiting client.  If
//!    there is one, the session is served to completion (blocking):
//!    every line goes to the handler and its reply is written back.
//! 3. The session ends when the peer disconnects, stays idle past the
//!    session timeout, or sends a line longer than the payload limit.
//!
//! `std::net` sits on lwIP under ESP-IDF, so the same code runs on the
//! device and the host.

use core::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::service::Reply;

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerError {
    /// The port could not be bound.
    Bind(u16),
    /// Socket-level failure outside a client session.
    Io,
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(port) => write!(f, "cannot bind TCP port {}", port),
            Self::Io => write!(f, "TCP/socket I/O error"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    IdleTimeout,
    LineTooLong,
    WriteFailed,
}

// ───────────────────────────────────────────────────────────────
// Listener
// ───────────────────────────────────────────────────────────────

pub struct LocalListener {
    listener: TcpListener,
    port: u16,
    max_line: usize,
    session_timeout: Duration,
    sessions: u32,
    last_end: Option<SessionEnd>,
}

impl LocalListener {
    /// Listen on `0.0.0.0:<port>`.  Port `0` lets the OS pick one (see
    /// [`local_addr`](Self::local_addr)).
    pub fn bind(port: u16, max_line: usize, session_timeout_ms: u32) -> Result<Self, ListenerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).map_err(|_| ListenerError::Bind(port))?;
        listener.set_nonblocking(true).map_err(|_| ListenerError::Io)?;
        info!("LOCAL: listening on port {}", port);
        Ok(Self {
            listener,
            port,
            max_line,
            session_timeout: Duration::from_millis(u64::from(session_timeout_ms.max(1))),
            sessions: 0,
            last_end: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Sessions served since boot.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// How the most recent session ended.
    pub fn last_end(&self) -> Option<SessionEnd> {
        self.last_end
    }

    /// Serve one waiting client, if any.
    ///
    /// Returns `Ok(None)` when nobody was waiting, otherwise the number of
    /// lines answered in the session.
    pub fn serve_next<F>(&mut self, handler: F) -> Result<Option<usize>, ListenerError>
    where
        F: FnMut(&str) -> Reply,
    {
        let (stream, peer) = match self.listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(e) => {
                warn!("LOCAL: accept failed: {}", e);
                return Err(ListenerError::Io);
            }
        };
        self.sessions = self.sessions.wrapping_add(1);
        info!("LOCAL: client {} connected", peer);

        // Per-client socket failures only end that session.
        let (lines, end) = match self.prepare(&stream) {
            Ok(()) => self.session(stream, handler),
            Err(()) => (0, SessionEnd::WriteFailed),
        };
        info!("LOCAL: client {} gone ({:?}, {} lines)", peer, end, lines);
        self.last_end = Some(end);
        Ok(Some(lines))
    }

    fn prepare(&self, stream: &TcpStream) -> Result<(), ()> {
        stream.set_nonblocking(false).map_err(|_| ())?;
        stream.set_read_timeout(Some(self.session_timeout)).map_err(|_| ())?;
        stream.set_write_timeout(Some(self.session_timeout)).map_err(|_| ())?;
        Ok(())
    }

    fn session<F>(&self, stream: TcpStream, mut handler: F) -> (usize, SessionEnd)
    where
        F: FnMut(&str) -> Reply,
    {
        let mut writer = match stream.try_clone() {
            Ok(w) => w,
            Err(_) => return (0, SessionEnd::WriteFailed),
        };
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(self.max_line + 2);
        let mut lines = 0;

        loop {
            buf.clear();
            // One byte past the limit (plus CRLF) tells an overlong line apart.
            let limit = (self.max_line + 2) as u64;
            let n = match reader.by_ref().take(limit).read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return (lines, SessionEnd::IdleTimeout);
                }
                Err(_) => return (lines, SessionEnd::PeerClosed),
            };
            if n == 0 {
                return (lines, SessionEnd::PeerClosed);
            }

            let terminated = buf.last() == Some(&b'\n');
            let line = trim_line_end(&buf);
            if line.len() > self.max_line {
                warn!("LOCAL: line exceeds {} bytes, closing session", self.max_line);
                let _ = writer.write_all(Reply::JsonError.as_line().as_bytes());
                return (lines + 1, SessionEnd::LineTooLong);
            }

            let reply = match core::str::from_utf8(line) {
                Ok(text) => {
                    debug!("LOCAL: rx {}", text);
                    handler(text)
                }
                Err(_) => Reply::JsonError,
            };
            lines += 1;
            if writer.write_all(reply.as_line().as_bytes()).is_err() {
                return (lines, SessionEnd::WriteFailed);
            }

            if !terminated {
                // Final unterminated line before EOF.
                return (lines, SessionEnd::PeerClosed);
            }
        }
    }
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
