//! P2MP I/O and Platform Abstraction
//!
//! Blocking UDP socket wrapper with per-call receive deadlines, and the
//! local-interface lookup the receiver uses to learn its own bind address.

pub mod iface;
pub mod socket;

pub use iface::{discover_ipv4, IfaceError};
pub use socket::{P2mpSocket, RecvOutcome, SocketError};
