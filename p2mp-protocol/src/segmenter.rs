//! File Segmenter
//!
//! Splits a byte source of known length into MSS-sized data segments with
//! sequence numbers starting at 0, followed by exactly one zero-length
//! terminal segment. Segments are produced in order, pull-style, so the
//! sender never holds more than one segment in memory.

use crate::packet::DataSegment;
use bytes::Bytes;
use std::io::Read;
use thiserror::Error;

/// Segmenter errors. All of these are local fatal conditions; the network
/// never causes them.
#[derive(Error, Debug)]
pub enum SegmenterError {
    #[error("maximum segment size must be nonzero")]
    ZeroMss,

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("file too large: {0} segments exceeds the sequence space")]
    TooManySegments(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Number of data segments (excluding the terminal one) for a file of
/// `len` bytes at segment size `mss`.
pub fn segment_count(len: u64, mss: usize) -> u64 {
    let mss = mss as u64;
    (len + mss - 1) / mss
}

/// Pull-based segment iterator over a readable byte source.
///
/// Produces `segment_count(len, mss)` data segments sized `mss` (the last
/// possibly shorter), then one terminal segment, then `None`. A read that
/// returns fewer bytes than the source length promised is fatal: the file
/// was truncated or another writer raced us.
pub struct Segmenter<R> {
    source: R,
    remaining: u64,
    mss: usize,
    next_seq: i32,
    terminal_sent: bool,
}

impl<R: Read> Segmenter<R> {
    /// Create a segmenter for a source of exactly `len` readable bytes.
    pub fn new(source: R, len: u64, mss: usize) -> Result<Self, SegmenterError> {
        if mss == 0 {
            return Err(SegmenterError::ZeroMss);
        }

        // The terminal segment needs one sequence number past the data.
        let segments = segment_count(len, mss);
        if segments >= i32::MAX as u64 {
            return Err(SegmenterError::TooManySegments(segments));
        }

        Ok(Segmenter {
            source,
            remaining: len,
            mss,
            next_seq: 0,
            terminal_sent: false,
        })
    }

    /// Produce the next segment, or `None` once the terminal segment has
    /// been handed out.
    pub fn next_segment(&mut self) -> Result<Option<DataSegment>, SegmenterError> {
        if self.terminal_sent {
            return Ok(None);
        }

        if self.remaining == 0 {
            self.terminal_sent = true;
            return Ok(Some(DataSegment::terminal(self.next_seq)));
        }

        let want = if self.remaining < self.mss as u64 {
            self.remaining as usize
        } else {
            self.mss
        };
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(SegmenterError::ShortRead {
                        expected: want,
                        actual: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SegmenterError::Io(e)),
            }
        }

        let segment = DataSegment::new(self.next_seq, Bytes::from(buf));
        self.remaining -= want as u64;
        self.next_seq += 1;
        Ok(Some(segment))
    }

    /// Sequence number the next produced segment will carry.
    pub fn next_seq(&self) -> i32 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(data: &[u8], mss: usize) -> Vec<DataSegment> {
        let mut segmenter = Segmenter::new(Cursor::new(data), data.len() as u64, mss).unwrap();
        let mut out = Vec::new();
        while let Some(segment) = segmenter.next_segment().unwrap() {
            out.push(segment);
        }
        out
    }

    #[test]
    fn test_exact_multiple() {
        let data = vec![0xAB; 40];
        let segments = collect(&data, 10);

        // 4 data segments + terminal
        assert_eq!(segments.len(), 5);
        for (i, segment) in segments.iter().take(4).enumerate() {
            assert_eq!(segment.header.seq, i as i32);
            assert_eq!(segment.payload.len(), 10);
        }
        assert!(segments[4].is_terminal());
        assert_eq!(segments[4].header.seq, 4);
    }

    #[test]
    fn test_short_final_segment() {
        let data = vec![1u8; 25];
        let segments = collect(&data, 10);

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[2].payload.len(), 5);
        assert!(segments[3].is_terminal());
        assert_eq!(segments[3].header.seq, 3);
    }

    #[test]
    fn test_concatenation_reproduces_source() {
        let data: Vec<u8> = (0..=255u8).cycle().take(999).collect();
        let segments = collect(&data, 128);

        assert_eq!(segments.len() as u64, segment_count(999, 128) + 1);

        let mut rebuilt = Vec::new();
        for segment in &segments {
            rebuilt.extend_from_slice(&segment.payload);
        }
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn test_empty_file_is_terminal_only() {
        let segments = collect(&[], 512);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_terminal());
        assert_eq!(segments[0].header.seq, 0);
    }

    #[test]
    fn test_short_read_is_fatal() {
        // Claim 100 bytes but only back it with 60.
        let data = vec![0u8; 60];
        let mut segmenter = Segmenter::new(Cursor::new(data), 100, 50).unwrap();

        assert!(segmenter.next_segment().unwrap().is_some());
        assert!(matches!(
            segmenter.next_segment(),
            Err(SegmenterError::ShortRead { expected: 50, .. })
        ));
    }

    #[test]
    fn test_zero_mss_rejected() {
        assert!(matches!(
            Segmenter::new(Cursor::new(vec![]), 0, 0),
            Err(SegmenterError::ZeroMss)
        ));
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count(0, 10), 0);
        assert_eq!(segment_count(1, 10), 1);
        assert_eq!(segment_count(10, 10), 1);
        assert_eq!(segment_count(11, 10), 2);
        assert_eq!(segment_count(100, 10), 10);
    }
}
