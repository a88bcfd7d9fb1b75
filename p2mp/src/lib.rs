//! P2MP-FTP - Point-to-Multipoint Reliable File Transfer
//!
//! High-level Rust API for the p2mp stop-and-wait file transfer protocol.

pub use p2mp_fanout as fanout;
pub use p2mp_io as io;
pub use p2mp_protocol as protocol;

// Re-export commonly used types
pub use fanout::{FanoutSender, SegmentWriter, TransferStats};
pub use protocol::{AckSegment, DataSegment, Packet, Segmenter, SENTINEL_SEQ};
