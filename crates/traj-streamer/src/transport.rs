// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Byte transport: listener + framed connection.
//
// The session engine only sees the `Listener` and `Connection` traits; the
// TCP implementation below is what the binary uses.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::abort::{AbortController, Unblocker};
use crate::error::TransportError;
use crate::protocol::{peek_length, LENGTH_PREFIX_SIZE, POINT_HEADER_SIZE};

/// Poll interval of the non-blocking accept loop.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read chunk size when draining the socket.
const READ_CHUNK: usize = 4096;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One connected streaming client.
pub trait Connection {
    /// Number of complete frames available without blocking.
    ///
    /// Returns [`TransportError::Closed`] once the peer has hung up and no
    /// complete frame remains.
    fn pending_frames(&mut self) -> Result<usize, TransportError>;

    /// Next complete frame, length prefix included. May block if called
    /// without a prior positive [`pending_frames`](Self::pending_frames).
    fn read_frame(&mut self) -> Result<Vec<u8>, TransportError>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Tear the connection down. Idempotent.
    fn force_close(&mut self);

    /// Handle that unblocks pending reads on this connection from another
    /// thread. Writes must keep working after it runs.
    fn unblocker(&self) -> Option<Unblocker> {
        None
    }

    /// Peer description for logs.
    fn peer(&self) -> String;
}

/// Source of connections.
pub trait Listener {
    type Conn: Connection;

    /// Block until a client connects. `Ok(None)` means shutdown fired first.
    fn accept(&mut self, abort: &AbortController) -> Result<Option<Self::Conn>, TransportError>;
}

// ---------------------------------------------------------------------------
// Frame buffer
// ---------------------------------------------------------------------------

/// Reassembles length-prefixed frames from a byte stream.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl FrameBuffer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(READ_CHUNK),
            max_frame_bytes,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Count complete frames, validating every length prefix seen.
    pub fn complete_frames(&self) -> Result<usize, TransportError> {
        let mut count = 0;
        let mut pos = 0;
        while let Some(len) = peek_length(&self.buf[pos..]) {
            self.check_length(len)?;
            let end = pos + LENGTH_PREFIX_SIZE + len;
            if end > self.buf.len() {
                break;
            }
            count += 1;
            pos = end;
        }
        Ok(count)
    }

    /// Remove and return the first complete frame.
    pub fn pop_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(len) = peek_length(&self.buf) else {
            return Ok(None);
        };
        self.check_length(len)?;
        let end = LENGTH_PREFIX_SIZE + len;
        if end > self.buf.len() {
            return Ok(None);
        }
        Ok(Some(self.buf.drain(..end).collect()))
    }

    fn check_length(&self, len: usize) -> Result<(), TransportError> {
        if len < POINT_HEADER_SIZE {
            return Err(TransportError::Framing(format!(
                "frame length {} below minimum {}",
                len, POINT_HEADER_SIZE
            )));
        }
        if len > self.max_frame_bytes {
            return Err(TransportError::Framing(format!(
                "frame length {} exceeds maximum {}",
                len, self.max_frame_bytes
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TCP connection
// ---------------------------------------------------------------------------

/// A framed TCP client connection.
///
/// The socket stays in blocking mode except while
/// [`pending_frames`](Connection::pending_frames) drains it.
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
    frames: FrameBuffer,
    eof: bool,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr, max_frame_bytes: usize) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            frames: FrameBuffer::new(max_frame_bytes),
            eof: false,
        })
    }

    fn drain_socket(&mut self) -> Result<(), TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => self.frames.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Connection for TcpConnection {
    fn pending_frames(&mut self) -> Result<usize, TransportError> {
        if !self.eof {
            self.stream.set_nonblocking(true)?;
            let drained = self.drain_socket();
            self.stream.set_nonblocking(false)?;
            drained?;
        }
        let count = self.frames.complete_frames()?;
        if count == 0 && self.eof {
            return Err(TransportError::Closed);
        }
        Ok(count)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.frames.pop_frame()? {
                return Ok(frame);
            }
            if self.eof {
                return Err(TransportError::Closed);
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.frames.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    fn force_close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        self.eof = true;
    }

    /// Shuts the read half only: a tick in progress must still be able to
    /// send its reply before the loop notices shutdown.
    fn unblocker(&self) -> Option<Unblocker> {
        let stream = self.stream.try_clone().ok()?;
        Some(Box::new(move || {
            let _ = stream.shutdown(Shutdown::Read);
        }))
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

// ---------------------------------------------------------------------------
// TCP listener
// ---------------------------------------------------------------------------

/// Single-client TCP listener.
pub struct TcpTransport {
    listener: TcpListener,
    max_frame_bytes: usize,
}

impl TcpTransport {
    /// Bind with `SO_REUSEADDR` so the server can re-listen right after a
    /// session ends.
    pub fn bind(addr: SocketAddr, max_frame_bytes: usize) -> io::Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1)?;
        // Non-blocking so accept can observe shutdown
        socket.set_nonblocking(true)?;
        Ok(Self {
            listener: socket.into(),
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Listener for TcpTransport {
    type Conn = TcpConnection;

    fn accept(&mut self, abort: &AbortController) -> Result<Option<TcpConnection>, TransportError> {
        loop {
            if abort.is_triggered() {
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    return TcpConnection::new(stream, peer, self.max_frame_bytes)
                        .map(Some)
                        .map_err(TransportError::from);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    abort.sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_point, TrajectoryPoint};

    fn frame(seq: i32) -> Vec<u8> {
        encode_point(&TrajectoryPoint::new(seq, vec![0.1, 0.2, 0.3], 0.5))
    }

    #[test]
    fn test_frame_buffer_partial_frames() {
        let mut fb = FrameBuffer::new(4096);
        let a = frame(1);
        let b = frame(2);

        fb.extend(&a[..10]);
        assert_eq!(fb.complete_frames().unwrap(), 0);
        assert_eq!(fb.pop_frame().unwrap(), None);

        fb.extend(&a[10..]);
        fb.extend(&b[..3]);
        assert_eq!(fb.complete_frames().unwrap(), 1);

        fb.extend(&b[3..]);
        assert_eq!(fb.complete_frames().unwrap(), 2);
        assert_eq!(fb.pop_frame().unwrap(), Some(a));
        assert_eq!(fb.pop_frame().unwrap(), Some(b));
        assert_eq!(fb.buffered_bytes(), 0);
    }

    #[test]
    fn test_frame_buffer_rejects_bad_prefix() {
        let mut fb = FrameBuffer::new(64);
        fb.extend(&4u32.to_le_bytes());
        assert!(matches!(
            fb.complete_frames(),
            Err(TransportError::Framing(_))
        ));

        let mut fb = FrameBuffer::new(64);
        fb.extend(&1000u32.to_le_bytes());
        assert!(matches!(fb.pop_frame(), Err(TransportError::Framing(_))));
    }

    #[test]
    fn test_accept_returns_none_after_abort() {
        let mut transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap(), 4096).unwrap();
        let abort = AbortController::new();
        abort.trigger();
        assert!(transport.accept(&abort).unwrap().is_none());
    }

    #[test]
    fn test_tcp_connection_frames_and_eof() {
        let mut transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap(), 4096).unwrap();
        let addr = transport.local_addr().unwrap();
        let abort = AbortController::new();

        let client = std::thread::spawn(move || {
            let mut s = TcpStream::connect(addr).unwrap();
            s.write_all(&frame(1)).unwrap();
            s.write_all(&frame(2)).unwrap();
        });

        let mut conn = transport.accept(&abort).unwrap().unwrap();
        client.join().unwrap();

        // Client wrote then closed; both frames must be readable before Closed.
        let mut seen = 0;
        loop {
            match conn.pending_frames() {
                Ok(0) => std::thread::sleep(Duration::from_millis(5)),
                Ok(_) => {
                    let f = conn.read_frame().unwrap();
                    assert_eq!(f.len(), 4 + 20 + 24);
                    seen += 1;
                }
                Err(TransportError::Closed) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(seen, 2);
        conn.force_close();
    }

    #[test]
    fn test_unblocker_keeps_write_half_open() {
        use crate::protocol::{Reply, REPLY_FRAME_SIZE};

        let mut transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap(), 4096).unwrap();
        let addr = transport.local_addr().unwrap();
        let abort = AbortController::new();

        let mut client = TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut conn = transport.accept(&abort).unwrap().unwrap();

        let unblock = conn.unblocker().unwrap();
        unblock();

        // Reads see end of stream, the reply still reaches the client.
        assert!(matches!(conn.pending_frames(), Err(TransportError::Closed)));
        conn.write(&Reply::ack(3).encode()).unwrap();

        let mut frame = [0u8; REPLY_FRAME_SIZE];
        client.read_exact(&mut frame).unwrap();
        assert_eq!(Reply::decode(&frame).unwrap(), Reply::ack(3));
        conn.force_close();
    }
}
