//! P2MP Protocol Core Implementation
//!
//! This crate implements the core of the p2mp point-to-multipoint file
//! transfer protocol: the segment wire format, the payload checksum, the
//! file segmenter, and the receiver-side accept/reject state machine.

pub mod checksum;
pub mod packet;
pub mod segmenter;
pub mod session;

pub use checksum::checksum;
pub use packet::{AckSegment, DataSegment, Packet, PacketError, SegmentHeader, SegmentKind};
pub use segmenter::{segment_count, Segmenter, SegmenterError};
pub use session::{Disposition, FixedLoss, LossModel, NoLoss, RandomLoss, ReceiverSession};

/// Sequence number meaning "nothing accepted yet / resynchronize".
///
/// Sent by a receiver that is asked to ack before it has accepted any
/// segment, and understood by the sender as "this destination missed the
/// start of the stream". Real segments always carry `seq >= 0`.
pub const SENTINEL_SEQ: i32 = -1;

/// Default maximum segment size in bytes.
pub const DEFAULT_MSS: usize = 1024;

/// Default ack wait per attempt on the sender side.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 120;
