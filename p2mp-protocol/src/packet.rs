//! Segment Wire Format
//!
//! Every p2mp datagram starts with an 8-byte header: a 32-bit signed
//! sequence number, a 16-bit payload checksum, and a 16-bit kind tag. All
//! fields are network byte order. Data datagrams append the payload; ack
//! datagrams are the header alone with the checksum field set to zero.

use crate::checksum::{self, checksum};
use crate::SENTINEL_SEQ;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the segment header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Kind tag for data segments.
const DATA_TAG: u16 = 0x5555;

/// Kind tag for acknowledgements.
const ACK_TAG: u16 = 0xAAAA;

/// Datagram kind, carried as one of two fixed bit patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Data segment: header + payload.
    Data,
    /// Acknowledgement: header only.
    Ack,
}

impl SegmentKind {
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            DATA_TAG => Some(SegmentKind::Data),
            ACK_TAG => Some(SegmentKind::Ack),
            _ => None,
        }
    }

    pub fn as_tag(self) -> u16 {
        match self {
            SegmentKind::Data => DATA_TAG,
            SegmentKind::Ack => ACK_TAG,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Data => write!(f, "DATA"),
            SegmentKind::Ack => write!(f, "ACK"),
        }
    }
}

/// Common segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Sequence number; `SENTINEL_SEQ` (-1) only ever appears in acks.
    pub seq: i32,
    /// Checksum over the payload (zero in acks).
    pub checksum: u16,
    /// Datagram kind.
    pub kind: SegmentKind,
}

impl SegmentHeader {
    /// Parse a header from bytes (network byte order).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        let seq = buf.get_i32();
        let checksum = buf.get_u16();
        let tag = buf.get_u16();
        let kind = SegmentKind::from_tag(tag).ok_or(PacketError::UnknownKind(tag))?;

        Ok(SegmentHeader { seq, checksum, kind })
    }

    /// Serialize the header (network byte order).
    pub fn to_bytes(&self, buf: &mut BytesMut) {
        buf.put_i32(self.seq);
        buf.put_u16(self.checksum);
        buf.put_u16(self.kind.as_tag());
    }
}

/// Data segment: header plus payload.
///
/// A zero-length payload marks the end of the stream; its sequence number
/// is one past the last real segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub header: SegmentHeader,
    pub payload: Bytes,
}

impl DataSegment {
    /// Create a data segment, computing the payload checksum.
    pub fn new(seq: i32, payload: Bytes) -> Self {
        DataSegment {
            header: SegmentHeader {
                seq,
                checksum: checksum(&payload),
                kind: SegmentKind::Data,
            },
            payload,
        }
    }

    /// The terminal zero-length segment closing a transfer.
    pub fn terminal(seq: i32) -> Self {
        DataSegment::new(seq, Bytes::new())
    }

    /// Whether this segment signals end of stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the stored checksum matches the payload.
    #[inline]
    pub fn checksum_ok(&self) -> bool {
        checksum::verify(&self.payload, self.header.checksum)
    }

    /// Total size on the wire (header + payload).
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the segment to bytes.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.to_bytes(&mut buf);
        buf.put_slice(&self.payload);
        buf
    }

    /// Parse a data segment from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = SegmentHeader::from_bytes(bytes)?;

        if header.kind != SegmentKind::Data {
            return Err(PacketError::WrongKind {
                expected: SegmentKind::Data,
                actual: header.kind,
            });
        }

        let payload = if bytes.len() > HEADER_SIZE {
            Bytes::copy_from_slice(&bytes[HEADER_SIZE..])
        } else {
            Bytes::new()
        };

        Ok(DataSegment { header, payload })
    }
}

/// Acknowledgement: header only.
///
/// The sequence number reports the segment just accepted, the last known
/// good one on an out-of-order arrival, or the sentinel when nothing has
/// been accepted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckSegment {
    pub header: SegmentHeader,
}

impl AckSegment {
    /// Ack for an accepted or re-acked sequence number.
    pub fn new(seq: i32) -> Self {
        AckSegment {
            header: SegmentHeader {
                seq,
                checksum: 0,
                kind: SegmentKind::Ack,
            },
        }
    }

    /// The "nothing accepted yet / resynchronize" ack.
    pub fn not_synchronized() -> Self {
        AckSegment::new(SENTINEL_SEQ)
    }

    /// Whether this ack carries the resynchronization sentinel.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.header.seq == SENTINEL_SEQ
    }

    #[inline]
    pub fn seq(&self) -> i32 {
        self.header.seq
    }

    /// Serialize the ack to bytes.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.header.to_bytes(&mut buf);
        buf
    }

    /// Parse an ack from bytes. Trailing bytes after the header are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = SegmentHeader::from_bytes(bytes)?;

        if header.kind != SegmentKind::Ack {
            return Err(PacketError::WrongKind {
                expected: SegmentKind::Ack,
                actual: header.kind,
            });
        }

        Ok(AckSegment { header })
    }
}

/// Unified datagram type (either data or ack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data(DataSegment),
    Ack(AckSegment),
}

impl Packet {
    pub fn is_data(&self) -> bool {
        matches!(self, Packet::Data(_))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Packet::Ack(_))
    }

    /// Get the packet header.
    pub fn header(&self) -> &SegmentHeader {
        match self {
            Packet::Data(s) => &s.header,
            Packet::Ack(a) => &a.header,
        }
    }

    /// Serialize the packet to bytes.
    pub fn to_bytes(&self) -> BytesMut {
        match self {
            Packet::Data(s) => s.to_bytes(),
            Packet::Ack(a) => a.to_bytes(),
        }
    }

    /// Parse a packet from bytes, dispatching on the kind tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = SegmentHeader::from_bytes(bytes)?;

        match header.kind {
            SegmentKind::Data => Ok(Packet::Data(DataSegment::from_bytes(bytes)?)),
            SegmentKind::Ack => Ok(Packet::Ack(AckSegment::from_bytes(bytes)?)),
        }
    }
}

/// Packet parsing and validation errors.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("unknown kind tag: {0:#06x}")]
    UnknownKind(u16),

    #[error("wrong packet kind: expected {expected}, got {actual}")]
    WrongKind {
        expected: SegmentKind,
        actual: SegmentKind,
    },
}
