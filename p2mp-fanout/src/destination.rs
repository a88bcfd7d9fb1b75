//! Destination bookkeeping
//!
//! One entry per receiver: its address, its dedicated link, and the state
//! the stop-and-wait loop needs. The set is fixed at construction for the
//! lifetime of a transfer; there is no dynamic membership.

use std::net::SocketAddr;

/// Per-destination counters.
#[derive(Debug, Clone, Default)]
pub struct DestinationStats {
    /// Segments this destination acknowledged.
    pub segments_acked: u64,
    /// Retransmissions sent to this destination.
    pub retransmits: u64,
    /// Ack deadlines that elapsed waiting on this destination.
    pub timeouts: u64,
    /// Stale acks received from this destination.
    pub stale_acks: u64,
    /// Segments abandoned after a sentinel ack.
    pub abandoned: u64,
}

/// One receiver in the fan-out set.
#[derive(Debug)]
pub struct Destination<L> {
    addr: SocketAddr,
    link: L,
    /// Set once this destination answers with the sentinel; it missed the
    /// start of the stream and cannot catch up mid-transfer.
    desynchronized: bool,
    stats: DestinationStats,
}

impl<L> Destination<L> {
    pub fn new(addr: SocketAddr, link: L) -> Self {
        Destination {
            addr,
            link,
            desynchronized: false,
            stats: DestinationStats::default(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    pub(crate) fn mark_desynchronized(&mut self) {
        self.desynchronized = true;
    }

    pub fn stats(&self) -> &DestinationStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DestinationStats {
        &mut self.stats
    }
}
