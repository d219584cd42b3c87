//! Transmit-side bookkeeping consulted from the receive path: the ordered
//! buffer of unacknowledged outbound DATA units and the small set of
//! counters ACK processing advances as hard-ACKs rotate packets out.
//!
//! The send side owns producing [`TxBuf`]s; the receive path (this crate)
//! only ever retires them from the front as `acks_hard_ack` advances.

use crate::seq::{after, before_eq};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// One outbound DATA unit still awaiting a hard ACK.
#[derive(Debug, Clone)]
pub struct TxBuf {
    pub seq: u32,
    pub last: bool,
}

impl TxBuf {
    pub fn new(seq: u32, last: bool) -> Self {
        Self { seq, last }
    }
}

/// Outcome of rotating the transmit window up to a new hard-ACK boundary.
#[derive(Debug, Default)]
pub struct RotationResult {
    /// Outbound packets retired by this rotation (`seq <= hard_ack`).
    pub nr_rot_new_acks: u32,
    /// Set when one of the retired packets carried the `LAST` flag.
    pub rot_last: bool,
    /// Set when this rotation's `hard_ack` overtook `acks_lowest_nak`,
    /// meaning the congestion controller should treat it as a fresh
    /// lowest-NAK signal.
    pub new_low_nack: bool,
}

/// The transmit-side window as seen from the receive path: everything ACK
/// processing needs to validate and rotate, nothing the send side needs to
/// decide what to transmit next.
pub struct TxWindow {
    buffer: VecDeque<TxBuf>,
    /// Lowest seq not yet hard-ACK'd minus one; i.e. everything `<=` this
    /// has been delivered and may be freed by the send side.
    acks_hard_ack: AtomicU32,
    /// One past the highest seq ever queued for send.
    tx_top: u32,
    /// Lowest seq believed lost (advanced by the NACK scan).
    acks_lowest_nak: u32,
}

impl TxWindow {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            acks_hard_ack: AtomicU32::new(0),
            tx_top: 0,
            acks_lowest_nak: 0,
        }
    }

    /// Queues a freshly-sent outbound packet. Called by the send side; kept
    /// here because rotation and validation need to walk the same buffer.
    pub fn push(&mut self, seq: u32, last: bool) {
        self.buffer.push_back(TxBuf::new(seq, last));
        if after(seq.wrapping_add(1), self.tx_top) {
            self.tx_top = seq.wrapping_add(1);
        }
    }

    pub fn tx_top(&self) -> u32 {
        self.tx_top
    }

    pub fn acks_lowest_nak(&self) -> u32 {
        self.acks_lowest_nak
    }

    /// Acquire-load of the published hard-ACK boundary; used by the send
    /// side to compute how much window is free.
    pub fn load_hard_ack(&self) -> u32 {
        self.acks_hard_ack.load(Ordering::Acquire)
    }

    fn store_hard_ack(&self, hard_ack: u32) {
        self.acks_hard_ack.store(hard_ack, Ordering::Release);
    }

    /// Number of outstanding (unacknowledged, in flight) outbound packets.
    pub fn flight_size(&self, hard_ack: u32, nr_acks: u32) -> u32 {
        (self.tx_top.wrapping_sub(hard_ack)).saturating_sub(nr_acks)
    }

    /// Rotates the buffer up to and including `hard_ack`, retiring every
    /// packet with `seq <= hard_ack`. Returns how many were retired and
    /// whether the retired run included the call's `LAST` packet.
    ///
    /// Also advances `acks_lowest_nak` per spec.md §4.4 step 9: if it sat
    /// exactly at the old hard-ACK boundary it tracks forward with it,
    /// otherwise it only advances when the new hard-ACK has overtaken it.
    pub fn rotate(&mut self, hard_ack: u32) -> RotationResult {
        let old_hard_ack = self.load_hard_ack();
        let mut result = RotationResult::default();

        while let Some(front) = self.buffer.front() {
            if !(after(front.seq, old_hard_ack) && before_eq(front.seq, hard_ack)) {
                break;
            }
            let txb = self.buffer.pop_front().expect("front just peeked");
            result.nr_rot_new_acks += 1;
            if txb.last {
                result.rot_last = true;
            }
        }

        if self.acks_lowest_nak == old_hard_ack {
            self.acks_lowest_nak = hard_ack;
        } else if after(hard_ack, self.acks_lowest_nak) {
            self.acks_lowest_nak = hard_ack;
            result.new_low_nack = true;
        }

        self.store_hard_ack(hard_ack);
        result
    }

    /// Full rotation to `tx_top`, used by ACKALL and by the client's
    /// receiving-reply edge (all outstanding request packets are implicitly
    /// ACK'd once a reply starts arriving).
    pub fn rotate_all(&mut self) -> RotationResult {
        self.rotate(self.tx_top)
    }

    /// Validates the monotonicity/range guard from spec.md §4.4 step 9
    /// before a rotation is attempted.
    pub fn validate_rotation(&self, hard_ack: u32, nr_acks: u32) -> bool {
        let old_hard_ack = self.load_hard_ack();
        before_eq(old_hard_ack, hard_ack)
            && before_eq(hard_ack, self.tx_top)
            && nr_acks <= self.tx_top.wrapping_sub(hard_ack)
    }
}

impl Default for TxWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: u32, last_at: u32) -> TxWindow {
        let mut tw = TxWindow::new();
        for seq in 1..=n {
            tw.push(seq, seq == last_at);
        }
        tw
    }

    #[test]
    fn rotation_retires_exactly_the_acked_run() {
        let mut tw = filled(10, 10);
        assert!(tw.validate_rotation(6, 0));
        let result = tw.rotate(6);
        assert_eq!(result.nr_rot_new_acks, 6);
        assert!(!result.rot_last);
        assert_eq!(tw.load_hard_ack(), 6);
        assert_eq!(tw.buffer.len(), 4);
    }

    #[test]
    fn rotate_all_retires_everything_and_reports_last() {
        let mut tw = filled(10, 10);
        let result = tw.rotate_all();
        assert_eq!(result.nr_rot_new_acks, 10);
        assert!(result.rot_last);
        assert_eq!(tw.load_hard_ack(), 10);
        assert!(tw.buffer.is_empty());
    }

    #[test]
    fn lowest_nak_tracks_hard_ack_when_pinned_at_it() {
        let mut tw = filled(10, 10);
        tw.rotate(3);
        assert_eq!(tw.acks_lowest_nak(), 3);
        tw.rotate(5);
        assert_eq!(tw.acks_lowest_nak(), 5);
    }

    #[test]
    fn validate_rotation_rejects_out_of_range_nr_acks() {
        let tw = filled(10, 10);
        assert!(!tw.validate_rotation(11, 0));
        assert!(!tw.validate_rotation(5, 20));
    }

    #[test]
    fn flight_size_accounts_for_soft_acks() {
        let tw = filled(10, 10);
        assert_eq!(tw.flight_size(0, 0), 10);
        assert_eq!(tw.flight_size(6, 2), 2);
    }
}
