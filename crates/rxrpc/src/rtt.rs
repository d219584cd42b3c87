//! A small fixed set of outstanding RTT-probe slots, matched against the
//! `acked_serial` carried on inbound ACKs.
//!
//! Per spec.md §5 the receive actor is the sole mutator of this table
//! (single-threaded cooperative with respect to a call's own state), so a
//! slot's available/pending transition is a plain state change guarded by
//! `&mut self` rather than a cross-thread atomic; nothing outside the
//! receive path ever reads RTT-slot state directly.

use crate::seq::after;
use std::time::Instant;

/// Which `rx_trace` bucket an RTT sample should be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttSampleKind {
    PingResponse,
    RequestedAck,
}

/// One matched sample, ready to hand to `peer.add_rtt`.
#[derive(Debug, Clone, Copy)]
pub struct RttSample {
    pub kind: RttSampleKind,
    pub sent_at: Instant,
    pub resp_time: Instant,
    pub serial: u32,
}

#[derive(Clone, Copy)]
struct Pending {
    serial: u32,
    sent_at: Instant,
}

pub const RTT_SLOTS: usize = 4;

/// Table of outstanding probes, sized by the call's configured
/// `CallConfig::rtt_slots` (spec.md §6's `RTT_SLOTS`).
pub struct RttProbes {
    slots: Vec<Option<Pending>>,
}

impl RttProbes {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
        }
    }

    /// Allocates a free slot for a freshly-sent probe, returning its index.
    /// `None` means every slot is pending; the caller should skip sending a
    /// probe until one frees up.
    pub fn allocate(&mut self, serial: u32, sent_at: Instant) -> Option<usize> {
        let slot = self.slots.iter_mut().position(|s| s.is_none())?;
        self.slots[slot] = Some(Pending { serial, sent_at });
        Some(slot)
    }

    /// Matches an inbound ACK's `acked_serial` against every pending slot,
    /// per spec.md §4.4 step 2. A slot whose serial matches exactly produces
    /// a sample under `kind` (when `Some`); a slot whose serial is older
    /// than `acked_serial` is obsoleted and freed with no sample. `kind`
    /// being `None` models a cancelling reason: the slot frees but no
    /// sample is recorded even on an exact match.
    pub fn match_ack(
        &mut self,
        acked_serial: u32,
        kind: Option<RttSampleKind>,
        resp_time: Instant,
    ) -> Vec<RttSample> {
        let mut samples = Vec::new();

        for slot in self.slots.iter_mut() {
            let Some(pending) = slot else { continue };
            if pending.serial == acked_serial {
                if let Some(kind) = kind {
                    samples.push(RttSample {
                        kind,
                        sent_at: pending.sent_at,
                        resp_time,
                        serial: pending.serial,
                    });
                }
                *slot = None;
            } else if after(acked_serial, pending.serial) {
                *slot = None;
            }
        }

        samples
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for RttProbes {
    fn default() -> Self {
        Self::new(RTT_SLOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn matching_serial_produces_one_sample_and_frees_slot() {
        let mut probes = RttProbes::new(RTT_SLOTS);
        let sent = Instant::now();
        probes.allocate(7, sent).unwrap();
        assert_eq!(probes.pending_count(), 1);

        let resp = sent + Duration::from_millis(20);
        let samples = probes.match_ack(7, Some(RttSampleKind::RequestedAck), resp);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].serial, 7);
        assert_eq!(probes.pending_count(), 0);
    }

    #[test]
    fn obsoleted_slot_produces_no_sample() {
        let mut probes = RttProbes::new(RTT_SLOTS);
        probes.allocate(3, Instant::now()).unwrap();
        let samples = probes.match_ack(10, None, Instant::now());
        assert!(samples.is_empty());
        assert_eq!(probes.pending_count(), 0);
    }

    #[test]
    fn cancel_kind_none_frees_without_sample() {
        let mut probes = RttProbes::new(RTT_SLOTS);
        probes.allocate(5, Instant::now()).unwrap();
        let samples = probes.match_ack(5, None, Instant::now());
        assert!(samples.is_empty());
        assert_eq!(probes.pending_count(), 0);
    }

    #[test]
    fn exhausting_all_slots_returns_none() {
        let mut probes = RttProbes::new(RTT_SLOTS);
        let now = Instant::now();
        for s in 0..RTT_SLOTS as u32 {
            assert!(probes.allocate(s, now).is_some());
        }
        assert!(probes.allocate(99, now).is_none());
    }

    #[test]
    fn samples_are_produced_in_arrival_order() {
        let mut probes = RttProbes::new(RTT_SLOTS);
        let now = Instant::now();
        probes.allocate(1, now).unwrap();
        probes.allocate(2, now).unwrap();
        let samples = probes.match_ack(2, Some(RttSampleKind::PingResponse), now);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].serial, 2);
    }
}
