//! `RXRPC_CALL_*`-style flag bits as a single atomic bitset with typed
//! accessors, per the design notes: a process-wide flags word rather than
//! scattered booleans, with atomic test-and-clear for `RETRANS_TIMEOUT`.

use std::sync::atomic::{AtomicU8, Ordering};

pub const TX_LAST: u8 = 1 << 0;
pub const RX_LAST: u8 = 1 << 1;
pub const TX_ALL_ACKED: u8 = 1 << 2;
pub const RETRANS_TIMEOUT: u8 = 1 << 3;
pub const IS_DEAD: u8 = 1 << 4;

#[derive(Debug, Default)]
pub struct CallFlags(AtomicU8);

impl CallFlags {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn test(&self, bit: u8) -> bool {
        self.0.load(Ordering::Acquire) & bit != 0
    }

    pub fn set(&self, bit: u8) {
        self.0.fetch_or(bit, Ordering::AcqRel);
    }

    pub fn clear(&self, bit: u8) {
        self.0.fetch_and(!bit, Ordering::AcqRel);
    }

    /// Atomically reads and clears `bit`, returning whether it was set.
    /// Used for `RETRANS_TIMEOUT`, which a fired timer sets and the next
    /// ACK-processing pass consumes exactly once.
    pub fn test_and_clear(&self, bit: u8) -> bool {
        self.0.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_test_clear_round_trip() {
        let flags = CallFlags::new();
        assert!(!flags.test(TX_LAST));
        flags.set(TX_LAST);
        assert!(flags.test(TX_LAST));
        flags.clear(TX_LAST);
        assert!(!flags.test(TX_LAST));
    }

    #[test]
    fn test_and_clear_fires_once() {
        let flags = CallFlags::new();
        flags.set(RETRANS_TIMEOUT);
        assert!(flags.test_and_clear(RETRANS_TIMEOUT));
        assert!(!flags.test_and_clear(RETRANS_TIMEOUT));
    }

    #[test]
    fn independent_bits_do_not_interfere() {
        let flags = CallFlags::new();
        flags.set(TX_LAST);
        flags.set(RX_LAST);
        flags.clear(TX_LAST);
        assert!(!flags.test(TX_LAST));
        assert!(flags.test(RX_LAST));
    }
}
