//! Transfer statistics

/// Counters for one sender-side transfer.
///
/// Shared with the optional stats-reporting thread behind
/// `Arc<parking_lot::RwLock<_>>`; the protocol loops are the only writers.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Distinct segments resolved across all destinations (terminal included).
    pub segments_sent: u64,
    /// Payload bytes handed to the network (first attempts only).
    pub payload_bytes: u64,
    /// Datagrams actually put on the wire, retransmissions included.
    pub datagrams_sent: u64,
    /// Retransmissions after an ack deadline elapsed.
    pub retransmits: u64,
    /// Ack deadlines that elapsed.
    pub timeouts: u64,
    /// Matching acks received.
    pub acks_matched: u64,
    /// Acks carrying a stale sequence number, ignored.
    pub acks_stale: u64,
    /// Segment deliveries abandoned because a destination answered with the
    /// resynchronization sentinel.
    pub abandoned: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }
}
