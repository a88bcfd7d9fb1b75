//! Property-based tests for the p2mp wire format
//!
//! These tests use proptest to generate random segments and verify that
//! serialization roundtrips, that the checksum catches payload corruption,
//! and that segmentation always reproduces the source byte-for-byte.

use bytes::Bytes;
use proptest::prelude::*;
use p2mp_protocol::checksum::{checksum, verify};
use p2mp_protocol::packet::{AckSegment, DataSegment, Packet, SegmentHeader, HEADER_SIZE};
use p2mp_protocol::segmenter::{segment_count, Segmenter};
use std::io::Cursor;

// Property test strategies

fn seq_strategy() -> impl Strategy<Value = i32> {
    0..i32::MAX
}

fn payload_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=2048).prop_map(Bytes::from)
}

proptest! {
    #[test]
    fn prop_data_segment_roundtrip(
        seq in seq_strategy(),
        payload in payload_strategy(),
    ) {
        let segment = DataSegment::new(seq, payload.clone());
        let serialized = segment.to_bytes();

        prop_assert_eq!(serialized.len(), HEADER_SIZE + payload.len());

        let deserialized = DataSegment::from_bytes(&serialized).unwrap();
        prop_assert_eq!(deserialized.header.seq, seq);
        prop_assert_eq!(deserialized.payload.clone(), payload);
        prop_assert!(deserialized.checksum_ok());
    }

    #[test]
    fn prop_ack_roundtrip(seq in -1..i32::MAX) {
        let ack = AckSegment::new(seq);
        let deserialized = AckSegment::from_bytes(&ack.to_bytes()).unwrap();

        prop_assert_eq!(deserialized.seq(), seq);
        prop_assert_eq!(deserialized.is_sentinel(), seq == -1);
    }

    #[test]
    fn prop_packet_dispatch(
        is_data in any::<bool>(),
        seq in seq_strategy(),
        payload in payload_strategy(),
    ) {
        let packet = if is_data {
            Packet::Data(DataSegment::new(seq, payload))
        } else {
            Packet::Ack(AckSegment::new(seq))
        };

        let deserialized = Packet::from_bytes(&packet.to_bytes()).unwrap();
        prop_assert_eq!(deserialized.is_data(), is_data);
        prop_assert_eq!(deserialized.header().seq, seq);
    }

    #[test]
    fn prop_checksum_detects_any_single_byte_corruption(
        payload in prop::collection::vec(any::<u8>(), 1..=512),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let stored = checksum(&payload);
        prop_assert!(verify(&payload, stored));

        let mut corrupted = payload.clone();
        let i = index.index(corrupted.len());
        corrupted[i] ^= flip;

        // A single flipped byte always changes the word sum.
        prop_assert!(!verify(&corrupted, stored));
    }

    #[test]
    fn prop_header_survives_trailing_garbage(
        seq in seq_strategy(),
        garbage in prop::collection::vec(any::<u8>(), 0..=64),
    ) {
        let ack = AckSegment::new(seq);
        let mut bytes = ack.to_bytes().to_vec();
        bytes.extend_from_slice(&garbage);

        let header = SegmentHeader::from_bytes(&bytes).unwrap();
        prop_assert_eq!(header.seq, seq);
    }

    #[test]
    fn prop_segmentation_reproduces_source(
        data in prop::collection::vec(any::<u8>(), 0..=4096),
        mss in 1usize..=512,
    ) {
        let mut segmenter = Segmenter::new(Cursor::new(&data), data.len() as u64, mss).unwrap();

        let mut rebuilt = Vec::new();
        let mut segments = 0u64;
        let mut expected_seq = 0i32;
        let mut saw_terminal = false;

        while let Some(segment) = segmenter.next_segment().unwrap() {
            prop_assert_eq!(segment.header.seq, expected_seq);
            prop_assert!(!saw_terminal, "terminal segment must come last");
            prop_assert!(segment.payload.len() <= mss);

            if segment.is_terminal() {
                saw_terminal = true;
            } else {
                rebuilt.extend_from_slice(&segment.payload);
                segments += 1;
            }
            expected_seq += 1;
        }

        prop_assert!(saw_terminal);
        prop_assert_eq!(segments, segment_count(data.len() as u64, mss));
        prop_assert_eq!(rebuilt, data);
    }
}
