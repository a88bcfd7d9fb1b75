//! UDP socket wrapper
//!
//! Blocking datagram sockets with an explicit per-call receive deadline.
//! The deadline call returns a tagged outcome so a timeout is an ordinary
//! value, never an error: the sender's retry loop and the receiver's main
//! loop both hang off [`RecvOutcome`].

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address")]
    InvalidAddress,

    #[error("receive deadline must be nonzero")]
    ZeroDeadline,
}

/// Result of a receive with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A datagram arrived: length and source address.
    Datagram { len: usize, from: SocketAddr },
    /// The deadline elapsed with nothing to read.
    TimedOut,
}

/// Blocking UDP socket.
pub struct P2mpSocket {
    inner: Socket,
}

impl P2mpSocket {
    /// Create a socket bound to the given address.
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        Ok(P2mpSocket { inner: socket })
    }

    /// Create a socket for talking to one destination: bound to an
    /// ephemeral local port and connected, so plain send/recv address it.
    pub fn for_destination(remote: SocketAddr) -> Result<Self, SocketError> {
        let local: SocketAddr = if remote.is_ipv4() {
            "0.0.0.0:0".parse().expect("static addr")
        } else {
            "[::]:0".parse().expect("static addr")
        };

        let socket = Self::bind(local)?;
        socket.inner.connect(&remote.into())?;
        Ok(socket)
    }

    /// Local address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send a datagram to the given address.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &target.into())?)
    }

    /// Send a datagram to the connected peer.
    pub fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        Ok(self.inner.send(buf)?)
    }

    /// Block until a datagram arrives.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        self.inner.set_read_timeout(None)?;
        let (len, addr) = self.inner.recv_from(uninit(buf))?;
        Ok((len, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }

    /// Block until a datagram arrives or the deadline elapses.
    ///
    /// A timeout is a normal outcome; only genuine socket failures return
    /// `Err`.
    pub fn recv_deadline(
        &self,
        buf: &mut [u8],
        deadline: Duration,
    ) -> Result<RecvOutcome, SocketError> {
        if deadline.is_zero() {
            return Err(SocketError::ZeroDeadline);
        }

        self.inner.set_read_timeout(Some(deadline))?;
        match self.inner.recv_from(uninit(buf)) {
            Ok((len, addr)) => Ok(RecvOutcome::Datagram {
                len,
                from: addr.as_socket().ok_or(SocketError::InvalidAddress)?,
            }),
            Err(e) if is_timeout(&e) => Ok(RecvOutcome::TimedOut),
            Err(e) => Err(SocketError::Io(e)),
        }
    }

    /// Set the receive buffer size.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Set the send buffer size.
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_send_buffer_size(size)?;
        Ok(())
    }
}

/// Platforms report an elapsed read timeout as either WouldBlock or TimedOut.
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// socket2 receives into MaybeUninit; our callers hand us initialized
/// buffers, so the reinterpretation is sound.
fn uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len()) }
}
