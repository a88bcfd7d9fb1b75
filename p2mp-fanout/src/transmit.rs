//! Fan-out transmitter
//!
//! For every segment, each destination gets its own stop-and-wait loop:
//! send, block for an ack up to the deadline, resend on timeout, advance on
//! a matching ack, abandon on the resynchronization sentinel. Destinations
//! are resolved sequentially; no segment N+1 goes to a destination before
//! its segment N is resolved, and at most one segment per destination is
//! ever in flight.

use crate::destination::Destination;
use crate::stats::TransferStats;
use p2mp_io::{P2mpSocket, RecvOutcome, SocketError};
use p2mp_protocol::packet::{AckSegment, DataSegment};
use p2mp_protocol::segmenter::{Segmenter, SegmenterError};
use parking_lot::RwLock;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Fan-out errors. Everything here is local-fatal; network loss and
/// reordering never surface as errors.
#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("segmenter error: {0}")]
    Segmenter(#[from] SegmenterError),

    #[error("no destinations configured")]
    NoDestinations,
}

/// One receive attempt on a destination link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A datagram of `len` bytes landed in the caller's buffer.
    Datagram(usize),
    /// The deadline elapsed.
    TimedOut,
}

/// Transport seam for the retransmission loop.
///
/// Production links are connected UDP sockets; tests substitute doubles to
/// bound the otherwise-unbounded retry loop.
pub trait DestinationLink {
    /// Fire one datagram at the destination, no delivery assumption.
    fn send(&mut self, datagram: &[u8]) -> Result<(), SocketError>;

    /// Block until a datagram arrives or the deadline elapses.
    fn recv_deadline(
        &mut self,
        buf: &mut [u8],
        deadline: Duration,
    ) -> Result<LinkEvent, SocketError>;
}

impl DestinationLink for P2mpSocket {
    fn send(&mut self, datagram: &[u8]) -> Result<(), SocketError> {
        P2mpSocket::send(self, datagram)?;
        Ok(())
    }

    fn recv_deadline(
        &mut self,
        buf: &mut [u8],
        deadline: Duration,
    ) -> Result<LinkEvent, SocketError> {
        match P2mpSocket::recv_deadline(self, buf, deadline)? {
            RecvOutcome::Datagram { len, .. } => Ok(LinkEvent::Datagram(len)),
            RecvOutcome::TimedOut => Ok(LinkEvent::TimedOut),
        }
    }
}

/// How one segment resolved for one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Acked,
    Abandoned,
}

/// Summary of one segment across the whole destination set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Every destination acknowledged the segment.
    AckedByAll,
    /// Some destinations answered with the sentinel and were skipped.
    Abandoned { desynchronized: Vec<SocketAddr> },
}

/// Sender-side fan-out engine over a fixed destination set.
pub struct FanoutSender<L> {
    destinations: Vec<Destination<L>>,
    ack_timeout: Duration,
    stats: Arc<RwLock<TransferStats>>,
}

impl FanoutSender<P2mpSocket> {
    /// Open one connected socket per destination address.
    pub fn connect(addrs: &[SocketAddr], ack_timeout: Duration) -> Result<Self, FanoutError> {
        if addrs.is_empty() {
            return Err(FanoutError::NoDestinations);
        }

        let mut destinations = Vec::with_capacity(addrs.len());
        for &addr in addrs {
            destinations.push(Destination::new(addr, P2mpSocket::for_destination(addr)?));
        }

        Ok(FanoutSender::new(destinations, ack_timeout))
    }
}

impl<L: DestinationLink> FanoutSender<L> {
    pub fn new(destinations: Vec<Destination<L>>, ack_timeout: Duration) -> Self {
        FanoutSender {
            destinations,
            ack_timeout,
            stats: Arc::new(RwLock::new(TransferStats::new())),
        }
    }

    /// Shared counters, for a stats-reporting thread.
    pub fn stats_handle(&self) -> Arc<RwLock<TransferStats>> {
        self.stats.clone()
    }

    pub fn destinations(&self) -> &[Destination<L>] {
        &self.destinations
    }

    /// Deliver one segment to every destination, retrying per destination
    /// until it acks, and skipping destinations that answer with the
    /// sentinel.
    pub fn send_segment(&mut self, segment: &DataSegment) -> Result<SegmentOutcome, FanoutError> {
        let datagram = segment.to_bytes();
        let seq = segment.header.seq;
        let timeout = self.ack_timeout;
        let mut desynchronized = Vec::new();

        for dest in &mut self.destinations {
            match resolve_destination(dest, &datagram, seq, timeout, &self.stats)? {
                Delivery::Acked => {}
                Delivery::Abandoned => desynchronized.push(dest.addr()),
            }
        }

        {
            let mut stats = self.stats.write();
            stats.segments_sent += 1;
            stats.payload_bytes += segment.payload.len() as u64;
        }

        if desynchronized.is_empty() {
            Ok(SegmentOutcome::AckedByAll)
        } else {
            Ok(SegmentOutcome::Abandoned { desynchronized })
        }
    }

    /// Drive a whole transfer: every segment the segmenter produces,
    /// terminal segment included.
    pub fn send_all<R: Read>(
        &mut self,
        segmenter: &mut Segmenter<R>,
    ) -> Result<TransferStats, FanoutError> {
        while let Some(segment) = segmenter.next_segment()? {
            let seq = segment.header.seq;
            match self.send_segment(&segment)? {
                SegmentOutcome::AckedByAll => {}
                SegmentOutcome::Abandoned { desynchronized } => {
                    tracing::warn!(
                        seq,
                        skipped = desynchronized.len(),
                        "segment not confirmed by desynchronized destinations"
                    );
                }
            }
        }

        Ok(self.stats.read().clone())
    }
}

/// Stop-and-wait loop for one segment and one destination.
///
/// Retries are unbounded: a destination that never answers stalls its own
/// loop, not the others. A stale ack (valid, non-matching, non-sentinel
/// sequence number) is ignored without restarting the deadline clock, so a
/// stream of duplicates can neither force an early resend nor postpone the
/// timeout-driven one.
fn resolve_destination<L: DestinationLink>(
    dest: &mut Destination<L>,
    datagram: &[u8],
    seq: i32,
    timeout: Duration,
    stats: &Arc<RwLock<TransferStats>>,
) -> Result<Delivery, FanoutError> {
    let mut buf = [0u8; 64];
    let mut first_attempt = true;

    loop {
        dest.link_mut().send(datagram)?;
        stats.write().datagrams_sent += 1;
        if !first_attempt {
            stats.write().retransmits += 1;
            dest.stats_mut().retransmits += 1;
        }
        first_attempt = false;

        let attempt_start = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(attempt_start.elapsed());
            if remaining.is_zero() {
                tracing::info!(seq, dest = %dest.addr(), "ack timeout");
                stats.write().timeouts += 1;
                dest.stats_mut().timeouts += 1;
                break; // resend
            }

            match dest.link_mut().recv_deadline(&mut buf, remaining)? {
                LinkEvent::TimedOut => {
                    tracing::info!(seq, dest = %dest.addr(), "ack timeout");
                    stats.write().timeouts += 1;
                    dest.stats_mut().timeouts += 1;
                    break; // resend
                }
                LinkEvent::Datagram(len) => {
                    let ack = match AckSegment::from_bytes(&buf[..len]) {
                        Ok(ack) => ack,
                        // Foreign or mangled datagram: keep waiting.
                        Err(_) => continue,
                    };

                    if ack.seq() == seq {
                        stats.write().acks_matched += 1;
                        dest.stats_mut().segments_acked += 1;
                        return Ok(Delivery::Acked);
                    }

                    if ack.is_sentinel() {
                        tracing::warn!(
                            seq,
                            dest = %dest.addr(),
                            "destination not synchronized, abandoning segment"
                        );
                        stats.write().abandoned += 1;
                        dest.stats_mut().abandoned += 1;
                        dest.mark_desynchronized();
                        return Ok(Delivery::Abandoned);
                    }

                    // Stale duplicate from an earlier segment.
                    tracing::debug!(seq, stale = ack.seq(), dest = %dest.addr(), "stale ack");
                    stats.write().acks_stale += 1;
                    dest.stats_mut().stale_acks += 1;
                }
            }
        }
    }
}
