//! The small piece of per-call state ACK processing checks monotonicity
//! against: `acks_first_seq`/`acks_prev_seq`, and the highest serial number
//! seen on a non-PING ACK. Kept apart from [`crate::call::Call`] only
//! because §4.4 steps 5-6 read and update exactly these fields together.

use crate::seq::{after, after_eq, before};

#[derive(Debug, Default)]
pub struct AckState {
    pub acks_first_seq: u32,
    pub acks_prev_seq: u32,
    pub acks_highest_serial: u32,
    seen_first_ack: bool,
}

impl AckState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Implements `is_ack_valid` from spec.md §4.4 step 5. `tx_winsize` is
    /// the transmit window size used for the previousPacket tolerance.
    pub fn is_valid(&self, first_soft_ack: u32, prev_pkt: u32, tx_winsize: u32) -> bool {
        if !self.seen_first_ack {
            return true;
        }
        let base = self.acks_first_seq;
        if after(first_soft_ack, base) {
            return true;
        }
        if before(first_soft_ack, base) {
            return false;
        }
        after_eq(prev_pkt, self.acks_prev_seq) || before(prev_pkt, base.wrapping_add(tx_winsize))
    }

    /// Step 6: records the latest anchors; `is_ping` suppresses the
    /// highest-serial advance (PINGs don't carry meaningful serials for
    /// this purpose).
    pub fn record(&mut self, first_soft_ack: u32, prev_pkt: u32, serial: u32, is_ping: bool) {
        self.acks_first_seq = first_soft_ack;
        self.acks_prev_seq = prev_pkt;
        self.seen_first_ack = true;
        if !is_ping && after(serial, self.acks_highest_serial) {
            self.acks_highest_serial = serial;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ack_is_always_valid() {
        let state = AckState::new();
        assert!(state.is_valid(1, 0, 32));
    }

    #[test]
    fn advancing_first_soft_ack_is_valid() {
        let mut state = AckState::new();
        state.record(5, 4, 10, false);
        assert!(state.is_valid(6, 5, 32));
    }

    #[test]
    fn regressing_first_soft_ack_is_rejected() {
        let mut state = AckState::new();
        state.record(5, 4, 10, false);
        assert!(!state.is_valid(4, 3, 32));
    }

    #[test]
    fn equal_first_soft_ack_accepts_non_regressing_prev_pkt() {
        let mut state = AckState::new();
        state.record(5, 4, 10, false);
        assert!(state.is_valid(5, 4, 32));
        assert!(state.is_valid(5, 6, 32));
    }

    #[test]
    fn equal_first_soft_ack_tolerates_serial_shaped_prev_pkt() {
        let mut state = AckState::new();
        state.record(100, 99, 10, false);
        // prev_pkt=3 looks like a regression but is within base+tx_winsize,
        // tolerating a peer that places a serial in previousPacket.
        assert!(state.is_valid(100, 3, 32));
    }

    #[test]
    fn ping_does_not_advance_highest_serial() {
        let mut state = AckState::new();
        state.record(1, 0, 50, false);
        state.record(1, 0, 200, true);
        assert_eq!(state.acks_highest_serial, 50);
    }
}
