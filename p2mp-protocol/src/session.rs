//! Receiver Session State Machine
//!
//! Tracks the next expected sequence number and the last accepted one, and
//! decides for each inbound datagram whether to accept it (write + ack),
//! re-ack the last good sequence number, or discard it silently. The
//! artificial loss roll used to exercise the retransmission path sits
//! behind the [`LossModel`] trait so tests can drive it deterministically.

use crate::packet::{AckSegment, DataSegment, Packet, SegmentKind};
use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Artificial-loss decision source.
///
/// Consulted once per checksum-valid data segment; returning `true` makes
/// the receiver behave as if the datagram never arrived (no ack, no write).
pub trait LossModel {
    fn drop_segment(&mut self) -> bool;
}

/// Never drops anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoss;

impl LossModel for NoLoss {
    fn drop_segment(&mut self) -> bool {
        false
    }
}

/// Drops each segment independently with a fixed probability.
#[derive(Debug)]
pub struct RandomLoss {
    probability: f64,
    rng: SmallRng,
}

impl RandomLoss {
    /// Create a loss model with drop probability clamped to [0, 1].
    pub fn new(probability: f64) -> Self {
        RandomLoss {
            probability: probability.clamp(0.0, 1.0),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seeded variant for reproducible runs.
    pub fn with_seed(probability: f64, seed: u64) -> Self {
        RandomLoss {
            probability: probability.clamp(0.0, 1.0),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl LossModel for RandomLoss {
    fn drop_segment(&mut self) -> bool {
        // gen::<f64>() is in [0, 1): p == 0.0 never drops, p == 1.0 always.
        self.rng.gen::<f64>() < self.probability
    }
}

/// Scripted loss decisions, consumed front to back; `false` once exhausted.
#[derive(Debug, Default)]
pub struct FixedLoss {
    script: std::collections::VecDeque<bool>,
}

impl FixedLoss {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        FixedLoss {
            script: script.into_iter().collect(),
        }
    }
}

impl LossModel for FixedLoss {
    fn drop_segment(&mut self) -> bool {
        self.script.pop_front().unwrap_or(false)
    }
}

/// Why a datagram was dropped without an ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Not parseable as a data segment (truncated, unknown tag, or an ack).
    NotData,
    /// Stored checksum does not match the payload.
    ChecksumMismatch,
    /// The artificial loss roll consumed it.
    SimulatedLoss,
}

/// Outcome of processing one inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// In-sequence segment: send `ack`, append `payload` to the output.
    /// `terminal` marks the zero-length end-of-stream segment; after it the
    /// session is finished.
    Accept {
        ack: AckSegment,
        payload: Bytes,
        terminal: bool,
    },
    /// Out-of-sequence segment: send `ack` (last good sequence number, or
    /// the sentinel if nothing has been accepted), write nothing.
    Reject { ack: AckSegment },
    /// Silently dropped; the sender will time out and retransmit.
    Discard(DiscardReason),
}

/// Per-transfer receiver state.
///
/// Mutated only by [`on_datagram`](ReceiverSession::on_datagram); the output
/// file is append-only in sequence order, so the written prefix never has
/// gaps or reordering regardless of what the network delivers.
#[derive(Debug)]
pub struct ReceiverSession {
    expected_seq: i32,
    last_accepted: Option<i32>,
    finished: bool,
}

impl ReceiverSession {
    pub fn new() -> Self {
        ReceiverSession {
            expected_seq: 0,
            last_accepted: None,
            finished: false,
        }
    }

    pub fn expected_seq(&self) -> i32 {
        self.expected_seq
    }

    pub fn last_accepted(&self) -> Option<i32> {
        self.last_accepted
    }

    /// Whether the terminal segment has been accepted.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Decide what to do with one inbound datagram.
    pub fn on_datagram<L: LossModel>(&mut self, datagram: &[u8], loss: &mut L) -> Disposition {
        let segment = match Packet::from_bytes(datagram) {
            Ok(Packet::Data(segment)) => segment,
            Ok(Packet::Ack(_)) | Err(_) => {
                trace!("discarding non-data datagram ({} bytes)", datagram.len());
                return Disposition::Discard(DiscardReason::NotData);
            }
        };

        if !segment.checksum_ok() {
            debug!(seq = segment.header.seq, "checksum mismatch, discarding");
            return Disposition::Discard(DiscardReason::ChecksumMismatch);
        }

        if loss.drop_segment() {
            debug!(seq = segment.header.seq, "simulated loss");
            return Disposition::Discard(DiscardReason::SimulatedLoss);
        }

        self.decide(segment)
    }

    /// Sequence decision for a checksum-valid data segment.
    pub fn decide(&mut self, segment: DataSegment) -> Disposition {
        if segment.header.seq == self.expected_seq {
            let ack = AckSegment::new(self.expected_seq);
            let terminal = segment.is_terminal();

            self.last_accepted = Some(self.expected_seq);
            self.expected_seq += 1;
            if terminal {
                self.finished = true;
            }

            Disposition::Accept {
                ack,
                payload: segment.payload,
                terminal,
            }
        } else {
            let ack = match self.last_accepted {
                Some(seq) => AckSegment::new(seq),
                None => AckSegment::not_synchronized(),
            };
            debug!(
                seq = segment.header.seq,
                expected = self.expected_seq,
                reack = ack.seq(),
                "out-of-sequence segment"
            );
            Disposition::Reject { ack }
        }
    }
}

impl Default for ReceiverSession {
    fn default() -> Self {
        ReceiverSession::new()
    }
}

/// Helper matching the kind tag without a full parse; used by loops that
/// want to ignore foreign traffic cheaply.
pub fn datagram_kind(datagram: &[u8]) -> Option<SegmentKind> {
    crate::packet::SegmentHeader::from_bytes(datagram)
        .ok()
        .map(|h| h.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SENTINEL_SEQ;

    fn data(seq: i32, payload: &'static [u8]) -> Vec<u8> {
        DataSegment::new(seq, Bytes::from_static(payload))
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_in_sequence_accept() {
        let mut session = ReceiverSession::new();

        match session.on_datagram(&data(0, b"first"), &mut NoLoss) {
            Disposition::Accept { ack, payload, terminal } => {
                assert_eq!(ack.seq(), 0);
                assert_eq!(&payload[..], b"first");
                assert!(!terminal);
            }
            other => panic!("expected accept, got {:?}", other),
        }

        assert_eq!(session.expected_seq(), 1);
        assert_eq!(session.last_accepted(), Some(0));
    }

    #[test]
    fn test_duplicate_then_gap_then_fill() {
        // Feed [0, 0, 2, 1]: duplicate, early arrival, then the gap filler.
        let mut session = ReceiverSession::new();
        let mut acks = Vec::new();
        let mut writes = Vec::new();

        for datagram in [data(0, b"a"), data(0, b"a"), data(2, b"c"), data(1, b"b")] {
            match session.on_datagram(&datagram, &mut NoLoss) {
                Disposition::Accept { ack, payload, .. } => {
                    acks.push(ack.seq());
                    writes.push(payload);
                }
                Disposition::Reject { ack } => acks.push(ack.seq()),
                Disposition::Discard(reason) => panic!("unexpected discard: {:?}", reason),
            }
        }

        assert_eq!(acks, vec![0, 0, 0, 1]);
        assert_eq!(writes.len(), 2);
        assert_eq!(&writes[0][..], b"a");
        assert_eq!(&writes[1][..], b"b");
    }

    #[test]
    fn test_late_joiner_acks_sentinel() {
        let mut session = ReceiverSession::new();

        match session.on_datagram(&data(5, b"late"), &mut NoLoss) {
            Disposition::Reject { ack } => {
                assert!(ack.is_sentinel());
                assert_eq!(ack.seq(), SENTINEL_SEQ);
            }
            other => panic!("expected reject, got {:?}", other),
        }

        // State is untouched: still waiting for segment 0.
        assert_eq!(session.expected_seq(), 0);
        assert_eq!(session.last_accepted(), None);
    }

    #[test]
    fn test_checksum_mismatch_is_silent() {
        let mut session = ReceiverSession::new();
        let mut datagram = data(0, b"payload");
        let last = datagram.len() - 1;
        datagram[last] ^= 0x40;

        assert_eq!(
            session.on_datagram(&datagram, &mut NoLoss),
            Disposition::Discard(DiscardReason::ChecksumMismatch)
        );
        assert_eq!(session.expected_seq(), 0);
    }

    #[test]
    fn test_ack_datagram_ignored() {
        let mut session = ReceiverSession::new();
        let ack = AckSegment::new(3).to_bytes();

        assert_eq!(
            session.on_datagram(&ack, &mut NoLoss),
            Disposition::Discard(DiscardReason::NotData)
        );
    }

    #[test]
    fn test_simulated_loss_drops_before_sequencing() {
        let mut session = ReceiverSession::new();
        let mut loss = FixedLoss::new([true, false]);

        assert_eq!(
            session.on_datagram(&data(0, b"x"), &mut loss),
            Disposition::Discard(DiscardReason::SimulatedLoss)
        );
        assert_eq!(session.expected_seq(), 0);

        // The retransmission gets through.
        assert!(matches!(
            session.on_datagram(&data(0, b"x"), &mut loss),
            Disposition::Accept { .. }
        ));
    }

    #[test]
    fn test_terminal_segment_finishes_session() {
        let mut session = ReceiverSession::new();
        session.on_datagram(&data(0, b"only"), &mut NoLoss);

        let terminal = DataSegment::terminal(1).to_bytes();
        match session.on_datagram(&terminal, &mut NoLoss) {
            Disposition::Accept { ack, terminal, .. } => {
                assert_eq!(ack.seq(), 1);
                assert!(terminal);
            }
            other => panic!("expected accept, got {:?}", other),
        }
        assert!(session.finished());
    }

    #[test]
    fn test_random_loss_extremes() {
        let mut never = RandomLoss::with_seed(0.0, 7);
        let mut always = RandomLoss::with_seed(1.0, 7);

        for _ in 0..100 {
            assert!(!never.drop_segment());
            assert!(always.drop_segment());
        }
    }
}
