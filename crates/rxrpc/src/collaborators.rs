//! Every external action the engine requests is a method on this trait.
//! No concrete socket, timer, or peer registry lives in this crate — the
//! `Call` is generic over its collaborators so the rest of the call/peer
//! machinery (out of scope per spec.md §1) can be swapped freely, and so
//! unit tests can record what the engine asked for without a socket.

use crate::error::CompletionKind;
use crate::rtt::RttSample;
use crate::wire::AckReason;
use std::time::Instant;

/// Tag attached to a proposed delayed ACK or PING, echoed back by the timer
/// collaborator when it fires. Opaque to this crate.
pub type ProposeTag = u64;

/// External collaborators the receive-side engine calls out to. One method
/// per egress action named in spec.md §6.
pub trait Collaborators {
    /// Send an ACK with the given reason, echoing `serial_echoed` (the
    /// inbound packet's serial, or the ACK's own serial for reactive
    /// replies).
    fn send_ack(&mut self, reason: AckReason, serial_echoed: u32);

    /// Arm the delayed-ACK timer for `serial` under `tag`.
    fn propose_delay_ack(&mut self, serial: u32, tag: ProposeTag);

    /// Schedule a PING to detect a lost final reply.
    fn propose_ping(&mut self, serial: u32, tag: ProposeTag);

    /// Congestion control asked the send side to retransmit in-flight data.
    fn request_resend(&mut self);

    /// Wake the user reader: new in-order data is available in `rx_queue`.
    fn notify_socket(&mut self);

    /// Emit a protocol-abort: trace the reason, mark the call locally
    /// aborted, and queue an outbound ABORT packet.
    fn abort(&mut self, reason_tag: &'static str, code: u32, errno: i32);

    /// Send the abort packet itself (split from `abort` so tests can assert
    /// on the two independently, mirroring the two-call shape in spec.md §6).
    fn send_abort_packet(&mut self, code: u32);

    /// Terminate the call with the given completion kind.
    fn set_completion(&mut self, kind: CompletionKind, abort_code: u32, errno: i32);

    /// Record an RTT sample against the peer.
    fn add_rtt(&mut self, sample: RttSample);
}

/// What [`crate::call::Call::receive`] did with one packet — returned for
/// the benefit of callers and tests; the `Collaborators` calls are the
/// side-effectful half of the story, this is the synchronous half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The packet was admitted (possibly after splitting a jumbo) and zero
    /// or more in-order packets were delivered to the user.
    Admitted { delivered: usize },
    /// The packet was a duplicate, out-of-window, or otherwise dropped
    /// without changing call state.
    Dropped,
    /// ACK processing ran to completion.
    AckProcessed,
    /// ACKALL rotated the transmit window.
    AckAll,
    /// The peer aborted the call.
    RemoteAbort,
    /// BUSY was ignored, per spec.md §9's preserved "doesn't make sense"
    /// note.
    BusyIgnored,
    /// The call reached a terminal state as a result of this packet.
    Completed,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Debug, Default)]
    pub struct Recorded {
        pub acks_sent: Vec<(AckReason, u32)>,
        pub delay_acks: Vec<(u32, ProposeTag)>,
        pub pings: Vec<(u32, ProposeTag)>,
        pub resend_requests: u32,
        pub notifications: u32,
        pub aborts: Vec<(&'static str, u32, i32)>,
        pub abort_packets: Vec<u32>,
        pub completions: Vec<(CompletionKind, u32, i32)>,
        pub rtt_samples: Vec<RttSample>,
    }

    #[derive(Default)]
    pub struct RecordingCollaborators {
        pub recorded: Recorded,
    }

    impl Collaborators for RecordingCollaborators {
        fn send_ack(&mut self, reason: AckReason, serial_echoed: u32) {
            self.recorded.acks_sent.push((reason, serial_echoed));
        }

        fn propose_delay_ack(&mut self, serial: u32, tag: ProposeTag) {
            self.recorded.delay_acks.push((serial, tag));
        }

        fn propose_ping(&mut self, serial: u32, tag: ProposeTag) {
            self.recorded.pings.push((serial, tag));
        }

        fn request_resend(&mut self) {
            self.recorded.resend_requests += 1;
        }

        fn notify_socket(&mut self) {
            self.recorded.notifications += 1;
        }

        fn abort(&mut self, reason_tag: &'static str, code: u32, errno: i32) {
            self.recorded.aborts.push((reason_tag, code, errno));
        }

        fn send_abort_packet(&mut self, code: u32) {
            self.recorded.abort_packets.push(code);
        }

        fn set_completion(&mut self, kind: CompletionKind, abort_code: u32, errno: i32) {
            self.recorded.completions.push((kind, abort_code, errno));
        }

        fn add_rtt(&mut self, sample: RttSample) {
            self.recorded.rtt_samples.push(sample);
        }
    }
}
