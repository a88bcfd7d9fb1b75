//! P2MP Fan-out Transfer Engine
//!
//! Sender side: deliver every segment to a fixed set of destinations, each
//! with its own stop-and-wait retransmission loop. Receiver side: the
//! datagram-to-file write-back loop around the protocol session. Both
//! halves of the transfer live here, glued to the codec in `p2mp-protocol`
//! and the sockets in `p2mp-io`.

pub mod destination;
pub mod receive;
pub mod stats;
pub mod transmit;

pub use destination::{Destination, DestinationStats};
pub use receive::{run_receiver, ReceiveError, ReceiveStats, SegmentWriter};
pub use stats::TransferStats;
pub use transmit::{DestinationLink, FanoutError, FanoutSender, LinkEvent, SegmentOutcome};
