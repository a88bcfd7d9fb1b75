//! Receiver write-back loop
//!
//! Glues the session state machine to an output sink and a socket: every
//! accepted payload is appended to the sink immediately, every disposition
//! that carries an ack gets it sent back to the datagram's source address.
//! The loop runs until the terminal segment is accepted.

use p2mp_io::{P2mpSocket, SocketError};
use p2mp_protocol::packet::AckSegment;
use p2mp_protocol::session::{DiscardReason, Disposition, LossModel, ReceiverSession};
use std::io::{self, Write};
use thiserror::Error;

/// Largest datagram the receive loop accepts. UDP payloads cannot exceed
/// this, so one buffer of this size fits any segment regardless of MSS.
const RECV_BUF_SIZE: usize = 65536;

/// Receive-side errors. Network conditions (corruption, reordering,
/// simulated loss) never show up here; only socket and sink failures do.
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

/// Counters for one receiver-side transfer.
#[derive(Debug, Clone, Default)]
pub struct ReceiveStats {
    /// Segments accepted and written (terminal included).
    pub segments_accepted: u64,
    /// Payload bytes appended to the sink.
    pub payload_bytes: u64,
    /// Out-of-sequence segments answered with a re-ack.
    pub reacked: u64,
    /// Datagrams dropped for a checksum mismatch.
    pub checksum_failures: u64,
    /// Datagrams consumed by the artificial loss roll.
    pub simulated_losses: u64,
    /// Datagrams that were not data segments at all.
    pub foreign: u64,
}

/// Session plus sink: turns datagrams into file bytes and acks.
///
/// Transport-agnostic so tests can feed it raw byte slices without a
/// socket.
pub struct SegmentWriter<W, L> {
    session: ReceiverSession,
    sink: W,
    loss: L,
    stats: ReceiveStats,
}

impl<W: Write, L: LossModel> SegmentWriter<W, L> {
    pub fn new(sink: W, loss: L) -> Self {
        SegmentWriter {
            session: ReceiverSession::new(),
            sink,
            loss,
            stats: ReceiveStats::default(),
        }
    }

    /// Whether the terminal segment has been accepted.
    pub fn finished(&self) -> bool {
        self.session.finished()
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    /// Process one datagram: maybe write, and return the ack to send back
    /// (`None` when the datagram is discarded silently).
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Option<AckSegment>, ReceiveError> {
        match self.session.on_datagram(datagram, &mut self.loss) {
            Disposition::Accept { ack, payload, terminal } => {
                self.sink.write_all(&payload)?;
                self.stats.segments_accepted += 1;
                self.stats.payload_bytes += payload.len() as u64;
                if terminal {
                    self.sink.flush()?;
                    tracing::info!(
                        segments = self.stats.segments_accepted,
                        bytes = self.stats.payload_bytes,
                        "transfer complete"
                    );
                }
                Ok(Some(ack))
            }
            Disposition::Reject { ack } => {
                self.stats.reacked += 1;
                Ok(Some(ack))
            }
            Disposition::Discard(reason) => {
                match reason {
                    DiscardReason::NotData => self.stats.foreign += 1,
                    DiscardReason::ChecksumMismatch => self.stats.checksum_failures += 1,
                    DiscardReason::SimulatedLoss => self.stats.simulated_losses += 1,
                }
                Ok(None)
            }
        }
    }

    /// Consume the writer, handing back the sink and the final counters.
    pub fn into_parts(self) -> (W, ReceiveStats) {
        (self.sink, self.stats)
    }
}

/// Blocking receiver main loop: read datagrams off the socket, feed them to
/// the writer, answer with acks, and return once the terminal segment lands.
pub fn run_receiver<W: Write, L: LossModel>(
    socket: &P2mpSocket,
    sink: W,
    loss: L,
) -> Result<ReceiveStats, ReceiveError> {
    let mut writer = SegmentWriter::new(sink, loss);
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    while !writer.finished() {
        let (len, from) = socket.recv_from(&mut buf)?;
        if let Some(ack) = writer.handle_datagram(&buf[..len])? {
            socket.send_to(&ack.to_bytes(), from)?;
        }
    }

    let (_, stats) = writer.into_parts();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use p2mp_protocol::packet::DataSegment;
    use p2mp_protocol::session::{FixedLoss, NoLoss};
    use p2mp_protocol::SENTINEL_SEQ;

    fn data(seq: i32, payload: &'static [u8]) -> Vec<u8> {
        DataSegment::new(seq, Bytes::from_static(payload))
            .to_bytes()
            .to_vec()
    }

    fn terminal(seq: i32) -> Vec<u8> {
        DataSegment::terminal(seq).to_bytes().to_vec()
    }

    #[test]
    fn test_in_order_stream_written_and_acked() {
        let mut writer = SegmentWriter::new(Vec::new(), NoLoss);

        for (seq, payload) in [(0, b"hello " as &[u8]), (1, b"world")] {
            let ack = writer
                .handle_datagram(&DataSegment::new(seq, Bytes::copy_from_slice(payload)).to_bytes())
                .unwrap()
                .expect("in-sequence segment must be acked");
            assert_eq!(ack.seq(), seq);
        }

        let ack = writer.handle_datagram(&terminal(2)).unwrap().unwrap();
        assert_eq!(ack.seq(), 2);
        assert!(writer.finished());

        let (sink, stats) = writer.into_parts();
        assert_eq!(sink, b"hello world");
        assert_eq!(stats.segments_accepted, 3);
        assert_eq!(stats.payload_bytes, 11);
    }

    #[test]
    fn test_duplicate_reacked_not_rewritten() {
        let mut writer = SegmentWriter::new(Vec::new(), NoLoss);

        writer.handle_datagram(&data(0, b"once")).unwrap();
        let ack = writer.handle_datagram(&data(0, b"once")).unwrap().unwrap();
        assert_eq!(ack.seq(), 0);

        let (sink, stats) = writer.into_parts();
        assert_eq!(sink, b"once");
        assert_eq!(stats.segments_accepted, 1);
        assert_eq!(stats.reacked, 1);
    }

    #[test]
    fn test_early_arrival_reacks_sentinel() {
        let mut writer = SegmentWriter::new(Vec::new(), NoLoss);

        let ack = writer.handle_datagram(&data(4, b"early")).unwrap().unwrap();
        assert_eq!(ack.seq(), SENTINEL_SEQ);
        assert!(ack.is_sentinel());
    }

    #[test]
    fn test_corrupted_datagram_no_ack_no_write() {
        let mut writer = SegmentWriter::new(Vec::new(), NoLoss);
        let mut datagram = data(0, b"payload");
        let last = datagram.len() - 1;
        datagram[last] ^= 0x01;

        assert!(writer.handle_datagram(&datagram).unwrap().is_none());

        let (sink, stats) = writer.into_parts();
        assert!(sink.is_empty());
        assert_eq!(stats.checksum_failures, 1);
    }

    #[test]
    fn test_simulated_loss_then_retransmission() {
        let mut writer = SegmentWriter::new(Vec::new(), FixedLoss::new([true]));

        assert!(writer.handle_datagram(&data(0, b"lost")).unwrap().is_none());
        assert_eq!(writer.stats().simulated_losses, 1);

        // Retransmission of the same segment is accepted exactly once.
        let ack = writer.handle_datagram(&data(0, b"lost")).unwrap().unwrap();
        assert_eq!(ack.seq(), 0);

        let (sink, _) = writer.into_parts();
        assert_eq!(sink, b"lost");
    }

    #[test]
    fn test_empty_transfer_is_terminal_only() {
        let mut writer = SegmentWriter::new(Vec::new(), NoLoss);

        let ack = writer.handle_datagram(&terminal(0)).unwrap().unwrap();
        assert_eq!(ack.seq(), 0);
        assert!(writer.finished());

        let (sink, stats) = writer.into_parts();
        assert!(sink.is_empty());
        assert_eq!(stats.segments_accepted, 1);
        assert_eq!(stats.payload_bytes, 0);
    }
}
