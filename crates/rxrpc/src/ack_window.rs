//! The receive-side sliding window: admits inbound DATA packets, maintains
//! the SACK bitmap, queues out-of-sequence packets until the gap closes, and
//! classifies each admission for the ACK the dispatcher will send back.
//!
//! `window` is the lowest sequence number not yet delivered to the user;
//! `wtop` is one past the highest sequence number ever admitted. Both are
//! published together through [`AckWindow::packed_bounds`] so a concurrent
//! reader (building an outbound ACKINFO) never observes a torn pair.

use crate::flags::{CallFlags, RX_LAST};
use crate::packet::Packet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default size of the SACK bitmap; also the largest `rx_winsize` this
/// window can represent by default, since every outstanding slot needs a
/// bit. A `Call` may configure a different size via `CallConfig::sack_size`
/// (validated against `rx_winsize` at `CallConfig::validate`).
pub const SACK_SIZE: usize = 256;

/// Why an in-order admission is being acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InOrderReason {
    /// At least one out-of-sequence packet was drained by this admission.
    Delay,
    /// The packet's `REQUEST_ACK` flag was set and nothing was drained.
    Requested,
    /// Neither of the above; the ack is left pending for the delay timer.
    PendingDelay,
}

/// Result of feeding one packet through [`AckWindow::admit`].
#[derive(Debug)]
pub enum AdmitOutcome {
    /// `seq` was already below `window`: already delivered.
    Duplicate,
    /// `seq` was already inside the window with its SACK bit set.
    DuplicateInWindow,
    /// `seq` was at or beyond `window + rx_winsize`.
    ExceedsWindow,
    /// `seq` was inside the window but left a gap before `window`.
    OutOfSequence,
    /// `seq` closed the gap at `window`; `delivered` is the in-order run
    /// (including `seq` itself) now ready to hand to the user.
    InOrder {
        delivered: Vec<Packet>,
        reason: InOrderReason,
    },
}

pub struct AckWindow {
    window: u32,
    wtop: u32,
    rx_winsize: u32,
    sack_size: usize,
    sack_table: Vec<bool>,
    rx_oos_queue: BTreeMap<u32, Packet>,
    nr_jumbo_bad: u32,
    rx_highest_seq: u32,
    unacked: u32,
    packed_bounds: AtomicU64,
}

impl AckWindow {
    /// `sack_size` is the call's configured `CallConfig::sack_size`; it must
    /// be at least `rx_winsize` (enforced by `CallConfig::validate`, and
    /// re-asserted here since this type has no other gate on construction).
    pub fn new(rx_winsize: u32, sack_size: u32) -> Self {
        assert!(
            rx_winsize <= sack_size,
            "rx_winsize must fit the SACK bitmap"
        );
        let window = 1;
        let wtop = window;
        Self {
            window,
            wtop,
            rx_winsize,
            sack_size: sack_size as usize,
            sack_table: vec![false; sack_size as usize],
            rx_oos_queue: BTreeMap::new(),
            nr_jumbo_bad: 0,
            rx_highest_seq: 0,
            unacked: 0,
            packed_bounds: AtomicU64::new(pack(window, wtop)),
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn wtop(&self) -> u32 {
        self.wtop
    }

    pub fn rx_winsize(&self) -> u32 {
        self.rx_winsize
    }

    pub fn nr_jumbo_bad(&self) -> u32 {
        self.nr_jumbo_bad
    }

    /// Acquire-loads the `(window, wtop)` pair published by the last
    /// admission. Used by a concurrent reader assembling an ACKINFO.
    pub fn load_bounds(&self) -> (u32, u32) {
        unpack(self.packed_bounds.load(Ordering::Acquire))
    }

    fn publish_bounds(&self) {
        self.packed_bounds
            .store(pack(self.window, self.wtop), Ordering::Release);
    }

    fn slot(&self, seq: u32) -> usize {
        (seq as usize) % self.sack_size
    }

    /// Classifies and (when in-order) admits `packet`, returning the ACK
    /// reason the caller should act on. Does not itself send anything; the
    /// dispatcher owns that decision so ack_window stays free of collaborator
    /// calls.
    ///
    /// `flags` carries the call's shared atomic bits so the last-packet
    /// (`LSN`/`LSA`) checks can be applied in place.
    pub fn admit(
        &mut self,
        packet: Packet,
        flags: &CallFlags,
    ) -> Result<AdmitOutcome, crate::error::ProtocolAbort> {
        use crate::error::ProtocolAbort;
        use crate::seq::{after_eq, before};

        let seq = packet.seq;
        let is_last = packet.last();

        if seq > self.rx_highest_seq {
            self.rx_highest_seq = seq;
        }

        if flags.test(RX_LAST) {
            if is_last {
                if seq.wrapping_add(1) != self.wtop {
                    // A second LAST packet disagrees with the end the first
                    // one already established.
                    return Err(ProtocolAbort::Lsn);
                }
            } else if after_eq(seq, self.wtop) {
                // A non-LAST packet arrived past the already-known end of
                // the call.
                return Err(ProtocolAbort::Lsa);
            }
        }
        if is_last {
            flags.set(RX_LAST);
        }

        if before(seq, self.window) {
            return Ok(AdmitOutcome::Duplicate);
        }

        if after_eq(seq, self.window + self.rx_winsize) {
            return Ok(AdmitOutcome::ExceedsWindow);
        }

        if seq == self.window {
            let mut delivered = Vec::with_capacity(1);
            self.window = self.window.wrapping_add(1);
            self.sack_table[self.slot(seq)] = false;
            delivered.push(packet);

            while let Some((&next_seq, _)) = self.rx_oos_queue.iter().next() {
                if next_seq != self.window {
                    break;
                }
                let next = self.rx_oos_queue.remove(&next_seq).expect("key just peeked");
                self.sack_table[self.slot(next_seq)] = false;
                self.window = self.window.wrapping_add(1);
                delivered.push(next);
            }

            if self.wtop != 0 && before(self.wtop, self.window) {
                self.wtop = self.window;
            }
            self.publish_bounds();

            let drained_oos = delivered.len() > 1;
            let reason = if drained_oos {
                InOrderReason::Delay
            } else if delivered[0].request_ack() {
                InOrderReason::Requested
            } else {
                self.unacked += 1;
                InOrderReason::PendingDelay
            };

            return Ok(AdmitOutcome::InOrder { delivered, reason });
        }

        let slot = self.slot(seq);
        if self.sack_table[slot] {
            return Ok(AdmitOutcome::DuplicateInWindow);
        }

        self.sack_table[slot] = true;
        if after_eq(seq, self.wtop) {
            self.wtop = seq.wrapping_add(1);
        }
        self.rx_oos_queue.insert(seq, packet);
        self.publish_bounds();

        Ok(AdmitOutcome::OutOfSequence)
    }

    /// Called by the jumbo splitter once per jumbo packet whose subpackets
    /// contained at least one duplicate, implementing the anti-DoS policy
    /// from the splitter design: too many offending jumbos and we stop
    /// admitting further subpackets from this peer until the window moves.
    pub fn note_jumbo_duplicate(&mut self) {
        self.nr_jumbo_bad += 1;
    }

    pub fn jumbo_bad_exceeded(&self) -> bool {
        self.nr_jumbo_bad > 3
    }
}

const fn pack(window: u32, wtop: u32) -> u64 {
    ((wtop as u64) << 32) | window as u64
}

const fn unpack(packed: u64) -> (u32, u32) {
    (packed as u32, (packed >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn pkt(seq: u32, flags: u8) -> Packet {
        Packet::new(seq, flags, seq, Bytes::new())
    }

    #[test]
    fn in_order_packet_advances_window() {
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        let flags = CallFlags::new();
        let outcome = w.admit(pkt(1, 0), &flags).unwrap();
        match outcome {
            AdmitOutcome::InOrder { delivered, reason } => {
                assert_eq!(delivered.len(), 1);
                assert_eq!(reason, InOrderReason::PendingDelay);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(w.window(), 2);
    }

    #[test]
    fn out_of_order_then_gap_fill_drains_oos_queue() {
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        let flags = CallFlags::new();

        let outcome = w.admit(pkt(3, 0), &flags).unwrap();
        assert!(matches!(outcome, AdmitOutcome::OutOfSequence));

        let outcome = w.admit(pkt(2, 0), &flags).unwrap();
        assert!(matches!(outcome, AdmitOutcome::OutOfSequence));

        let outcome = w.admit(pkt(1, 0), &flags).unwrap();
        match outcome {
            AdmitOutcome::InOrder { delivered, reason } => {
                assert_eq!(delivered.len(), 3);
                assert_eq!(reason, InOrderReason::Delay);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(w.window(), 4);
    }

    #[test]
    fn duplicate_below_window_never_redelivers() {
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        let flags = CallFlags::new();
        w.admit(pkt(1, 0), &flags).unwrap();
        let outcome = w.admit(pkt(1, 0), &flags).unwrap();
        assert!(matches!(outcome, AdmitOutcome::Duplicate));
    }

    #[test]
    fn duplicate_inside_window_leaves_sack_bit_untouched() {
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        let flags = CallFlags::new();
        w.admit(pkt(3, 0), &flags).unwrap();
        let outcome = w.admit(pkt(3, 0), &flags).unwrap();
        assert!(matches!(outcome, AdmitOutcome::DuplicateInWindow));
        assert!(w.rx_oos_queue.contains_key(&3));
    }

    #[test]
    fn exceeds_window_is_rejected_without_mutation() {
        let mut w = AckWindow::new(4, SACK_SIZE as u32);
        let flags = CallFlags::new();
        let before = w.window();
        let outcome = w.admit(pkt(100, 0), &flags).unwrap();
        assert!(matches!(outcome, AdmitOutcome::ExceedsWindow));
        assert_eq!(w.window(), before);
    }

    #[test]
    fn second_inconsistent_last_packet_aborts_lsa() {
        use crate::wire::FLAG_LAST;
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        let flags = CallFlags::new();
        w.admit(pkt(5, FLAG_LAST), &flags).unwrap();
        let err = w.admit(pkt(6, 0), &flags);
        assert!(matches!(err, Err(crate::error::ProtocolAbort::Lsa)));
    }

    #[test]
    fn jumbo_bad_counter_trips_after_four() {
        let mut w = AckWindow::new(32, SACK_SIZE as u32);
        for _ in 0..4 {
            w.note_jumbo_duplicate();
        }
        assert!(w.jumbo_bad_exceeded());
    }
}
