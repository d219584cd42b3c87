//! The dispatcher that ties every other module together: one `Call` owns
//! its [`AckWindow`], [`TxWindow`], [`RttProbes`], and [`Congestion`], and
//! [`Call::receive`] is the single ingress point named in spec.md §6.

use crate::ack_state::AckState;
use crate::ack_window::{AckWindow, AdmitOutcome, InOrderReason};
use crate::collaborators::{Collaborators, Disposition, ProposeTag};
use crate::config::CallConfig;
use crate::congestion::{AckSummary, Congestion};
use crate::error::{CallError, CompletionKind, ProtocolAbort};
use crate::flags::{CallFlags, IS_DEAD, RETRANS_TIMEOUT, TX_ALL_ACKED, TX_LAST};
use crate::fsm::{self, Phase};
use crate::jumbo;
use crate::packet::Packet;
use crate::rtt::{RttProbes, RttSampleKind};
use crate::seq::after;
use crate::tx_window::TxWindow;
use crate::wire::{AbortBody, AckBody, AckReason, PacketType, WireHeader};
use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A single call's receive-side engine. Generic callers interact through
/// `receive`; everything else is read via the small accessor methods used
/// by tests and the demo binary.
pub struct Call {
    config: CallConfig,
    flags: CallFlags,
    phase: Phase,
    ack_window: AckWindow,
    tx_window: TxWindow,
    rtt: RttProbes,
    congestion: Congestion,
    ack_state: AckState,
    /// Transmit window size used by `is_ack_valid`'s previousPacket
    /// tolerance; distinct from the receive-side `rx_winsize`.
    tx_winsize: u32,
    /// Set once the client's first reply DATA has rotated the outstanding
    /// request packets; feeds `fsm::end_of_tx_phase`.
    reply_begun: bool,
    /// Approximates the peer's own RTT-sample count (spec.md §4.5's
    /// `peer.rtt_count`); the real peer object lives outside this crate's
    /// scope, so this is incremented locally each time we record a sample.
    peer_rtt_count: u32,
    peer_rwind: Option<u32>,
    peer_mtu: Option<u32>,
}

impl Call {
    pub fn new(config: CallConfig, phase: Phase, now: Instant) -> Self {
        let tx_winsize = config.tx_max_window;
        Self {
            ack_window: AckWindow::new(config.rx_winsize, config.sack_size),
            tx_window: TxWindow::new(),
            rtt: RttProbes::new(config.rtt_slots as usize),
            congestion: Congestion::new(now, config.tx_smss),
            ack_state: AckState::new(),
            tx_winsize,
            reply_begun: false,
            peer_rtt_count: 0,
            peer_rwind: None,
            peer_mtu: None,
            config,
            flags: CallFlags::new(),
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn flags(&self) -> &CallFlags {
        &self.flags
    }

    pub fn ack_window(&self) -> &AckWindow {
        &self.ack_window
    }

    pub fn tx_window(&self) -> &TxWindow {
        &self.tx_window
    }

    pub fn congestion(&self) -> &Congestion {
        &self.congestion
    }

    /// Queues a freshly-sent outbound DATA packet. Exposed so tests (and
    /// the send side, out of scope here) can populate `TxWindow` before
    /// feeding in ACKs.
    pub fn note_sent(&mut self, seq: u32, last: bool, now: Instant) {
        self.tx_window.push(seq, last);
        self.congestion.note_send(now);
    }

    /// Fires the externally-owned retransmit timer, per spec.md §5: sets
    /// `RETRANS_TIMEOUT`, consumed by the next ACK pass via test-and-clear.
    pub fn note_retransmit_timeout(&mut self) {
        self.flags.set(RETRANS_TIMEOUT);
    }

    /// The single ingress point named in spec.md §6. Takes ownership of
    /// `payload` (the packet body following the wire header).
    pub fn receive(
        &mut self,
        header: WireHeader,
        payload: Bytes,
        collabs: &mut impl Collaborators,
        now: Instant,
        srtt: Duration,
    ) -> Result<Disposition, CallError> {
        if self.flags.test(IS_DEAD) {
            // Idempotent: any terminating event after COMPLETE_* is a no-op.
            return Ok(Disposition::Completed);
        }

        match header.packet_type {
            PacketType::Data => self.handle_data(header, payload, collabs),
            PacketType::Ack => self.handle_ack(header, payload, collabs, now, srtt),
            PacketType::AckAll => self.handle_ack_all(collabs),
            PacketType::Abort => self.handle_abort(payload, collabs),
            PacketType::Busy => Ok(Disposition::BusyIgnored),
        }
    }

    /// Presents the terminating packet of an implicitly-ended call per
    /// spec.md §4.6: the connection saw a new call number on the same
    /// channel before this one reached a terminal phase on its own.
    pub fn handle_implicit_end(
        &mut self,
        collabs: &mut impl Collaborators,
    ) -> Result<Disposition, CallError> {
        if self.phase == Phase::ServerAwaitAck {
            self.phase = Phase::Complete(CompletionKind::Success);
            collabs.set_completion(CompletionKind::Success, 0, 0);
            Ok(Disposition::Completed)
        } else {
            Err(self.local_abort(collabs, ProtocolAbort::Imp))
        }
    }

    fn local_abort(
        &mut self,
        collabs: &mut impl Collaborators,
        reason: ProtocolAbort,
    ) -> CallError {
        warn!(tag = reason.tag(), "protocol abort, call dying");
        self.flags.set(IS_DEAD);
        self.phase = Phase::Complete(CompletionKind::LocallyAborted);
        collabs.abort(reason.tag(), 0, 0);
        collabs.send_abort_packet(0);
        collabs.set_completion(CompletionKind::LocallyAborted, 0, 0);
        CallError::Protocol(reason)
    }

    fn handle_data(
        &mut self,
        header: WireHeader,
        payload: Bytes,
        collabs: &mut impl Collaborators,
    ) -> Result<Disposition, CallError> {
        // Checksum/security decryption is an external collaborator's job
        // (spec.md §1); `payload` arrives already plaintext.

        if self.phase.is_client()
            && matches!(
                self.phase,
                Phase::ClientSendRequest | Phase::ClientAwaitReply
            )
        {
            self.receiving_reply_edge(collabs)?;
        }

        if header.jumbo() && self.ack_window.jumbo_bad_exceeded() {
            collabs.send_ack(AckReason::NoSpace, header.serial);
            return Ok(Disposition::Dropped);
        }

        let packets = if header.jumbo() {
            jumbo::split(
                header.seq,
                header.flags,
                header.serial,
                payload,
                self.config.jumbo_datalen as usize,
            )
            .map_err(|e| self.local_abort(collabs, e))?
            .packets
        } else {
            vec![Packet::new(header.seq, header.flags, header.serial, payload)]
        };

        let mut delivered_total = 0usize;
        let mut saw_jumbo_duplicate = false;

        for packet in packets {
            let serial = packet.serial;
            let outcome = self
                .ack_window
                .admit(packet, &self.flags)
                .map_err(|e| self.local_abort(collabs, e))?;

            match outcome {
                AdmitOutcome::Duplicate => {
                    trace!(seq = serial, "duplicate below window, dropped");
                    collabs.send_ack(AckReason::Duplicate, serial);
                }
                AdmitOutcome::DuplicateInWindow => {
                    trace!(seq = serial, "duplicate inside window, dropped");
                    if header.jumbo() {
                        saw_jumbo_duplicate = true;
                    }
                    collabs.send_ack(AckReason::Duplicate, serial);
                }
                AdmitOutcome::ExceedsWindow => {
                    trace!(seq = serial, "exceeds receive window, dropped");
                    collabs.send_ack(AckReason::ExceedsWindow, serial);
                }
                AdmitOutcome::OutOfSequence => {
                    trace!(seq = serial, "admitted out of sequence");
                    collabs.send_ack(AckReason::OutOfSequence, serial);
                }
                AdmitOutcome::InOrder { delivered, reason } => {
                    trace!(count = delivered.len(), "admitted in order");
                    delivered_total += delivered.len();
                    match reason {
                        InOrderReason::Delay => {
                            collabs.send_ack(AckReason::Delay, serial);
                        }
                        InOrderReason::Requested => {
                            collabs.send_ack(AckReason::Requested, serial);
                        }
                        InOrderReason::PendingDelay => {
                            collabs.propose_delay_ack(serial, serial as ProposeTag);
                        }
                    }
                }
            }
        }

        if saw_jumbo_duplicate {
            self.ack_window.note_jumbo_duplicate();
        }

        if delivered_total > 0 {
            collabs.notify_socket();
        }

        Ok(Disposition::Admitted {
            delivered: delivered_total,
        })
    }

    /// spec.md §4.6 "Receiving-reply edge".
    fn receiving_reply_edge(
        &mut self,
        collabs: &mut impl Collaborators,
    ) -> Result<(), CallError> {
        let rotation = self.tx_window.rotate_all();
        if !rotation.rot_last {
            return Err(self.local_abort(collabs, ProtocolAbort::Txl));
        }
        self.flags.set(TX_LAST);
        self.flags.set(TX_ALL_ACKED);
        self.reply_begun = true;
        let next = fsm::end_of_tx_phase(self.phase, true)
            .map_err(|e| self.local_abort(collabs, e))?;
        debug!(from = ?self.phase, to = ?next, "reply begun, phase transition");
        self.phase = next;
        Ok(())
    }

    fn handle_ack_all(
        &mut self,
        collabs: &mut impl Collaborators,
    ) -> Result<Disposition, CallError> {
        let rotation = self.tx_window.rotate_all();
        if rotation.rot_last {
            self.flags.set(TX_LAST);
            self.flags.set(TX_ALL_ACKED);
            let next = fsm::end_of_tx_phase(self.phase, self.reply_begun)
                .map_err(|e| self.local_abort(collabs, e))?;
            debug!(from = ?self.phase, to = ?next, "ACKALL rotated last packet, phase transition");
            self.phase = next;
            if let Phase::Complete(kind) = next {
                collabs.set_completion(kind, 0, 0);
            }
        }
        Ok(Disposition::AckAll)
    }

    fn handle_abort(
        &mut self,
        payload: Bytes,
        collabs: &mut impl Collaborators,
    ) -> Result<Disposition, CallError> {
        let mut reader = payload;
        let body = AbortBody::decode(&mut reader).map_err(CallError::Wire)?;
        warn!(code = body.abort_code, "remote ABORT received");
        self.flags.set(IS_DEAD);
        self.phase = Phase::Complete(CompletionKind::RemotelyAborted);
        collabs.set_completion(CompletionKind::RemotelyAborted, body.abort_code, 0);
        Ok(Disposition::RemoteAbort)
    }

    #[allow(clippy::too_many_lines)]
    fn handle_ack(
        &mut self,
        header: WireHeader,
        payload: Bytes,
        collabs: &mut impl Collaborators,
        now: Instant,
        srtt: Duration,
    ) -> Result<Disposition, CallError> {
        let mut reader = payload;
        let body = AckBody::decode(&mut reader).map_err(CallError::Wire)?;

        let ack_serial = header.serial;
        let acked_serial = body.serial;
        let first_soft_ack = body.first_packet;
        let prev_pkt = body.previous_packet;
        let hard_ack = first_soft_ack.wrapping_sub(1);
        let nr_acks = body.acks.len() as u32;
        let is_ping = body.reason == AckReason::Ping;

        // Step 2: RTT matching.
        let kind = match body.reason {
            AckReason::PingResponse => Some(RttSampleKind::PingResponse),
            AckReason::Requested => Some(RttSampleKind::RequestedAck),
            _ => None,
        };
        for sample in self.rtt.match_ack(acked_serial, kind, now) {
            self.peer_rtt_count += 1;
            collabs.add_rtt(sample);
        }

        // Step 3: reactive ACKs.
        if is_ping {
            collabs.send_ack(AckReason::PingResponse, ack_serial);
        } else if header.request_ack() {
            collabs.send_ack(AckReason::Requested, ack_serial);
        }

        // Step 4: NAT/migration shortcuts, client calls only.
        if self.phase.is_client() {
            let anchored = first_soft_ack == 1 && prev_pkt == 0;
            let reset = (body.reason == AckReason::ExceedsWindow && anchored)
                || (body.reason == AckReason::OutOfSequence
                    && anchored
                    && self.tx_window.load_hard_ack() == 0);
            if reset {
                self.flags.set(IS_DEAD);
                self.phase = Phase::Complete(CompletionKind::RemotelyAborted);
                collabs.set_completion(CompletionKind::RemotelyAborted, 0, libc_econnreset());
                return Ok(Disposition::Completed);
            }
        }

        // Step 5: monotonicity.
        if !self.ack_state.is_valid(first_soft_ack, prev_pkt, self.tx_winsize) {
            return Ok(Disposition::AckProcessed);
        }

        // Step 6: bookkeeping.
        self.ack_state.record(first_soft_ack, prev_pkt, ack_serial, is_ping);

        // Step 7: ackinfo.
        if let Some(info) = body.info {
            let clamped = info.rwind.min(self.config.tx_max_window);
            if self.peer_rwind != Some(clamped) {
                self.peer_rwind = Some(clamped);
                self.congestion.observe_peer_rwind(clamped);
            }
            let mtu = info.rx_mtu.min(info.max_mtu);
            if self.peer_mtu.map(|cur| mtu < cur).unwrap_or(true) {
                self.peer_mtu = Some(mtu);
            }
        }

        // Step 8: state guard.
        if !self.phase.accepts_tx_effects() {
            return Ok(Disposition::AckProcessed);
        }

        // Step 9: Tx rotation.
        if first_soft_ack == 0 {
            return Err(self.local_abort(collabs, ProtocolAbort::Ak0));
        }
        if !self.tx_window.validate_rotation(hard_ack, nr_acks) {
            return Err(self.local_abort(collabs, ProtocolAbort::Akw));
        }

        let mut nr_rot_new_acks = 0;
        let mut new_low_nack = false;
        if after(hard_ack, self.tx_window.load_hard_ack()) {
            let rotation = self.tx_window.rotate(hard_ack);
            nr_rot_new_acks = rotation.nr_rot_new_acks;
            new_low_nack |= rotation.new_low_nack;
            if rotation.rot_last {
                self.flags.set(TX_LAST);
                let next = fsm::end_of_tx_phase(self.phase, self.reply_begun)
                    .map_err(|e| self.local_abort(collabs, e))?;
                self.flags.set(TX_ALL_ACKED);
                self.phase = next;
                if let Phase::Complete(kind) = next {
                    collabs.set_completion(kind, 0, 0);
                }
            }
        }

        // Step 10: soft-ACK scan.
        let mut nr_new_acks = 0;
        let mut saw_nacks = false;
        for (i, ack) in body.acks.iter().enumerate() {
            match ack {
                crate::wire::SoftAck::Ack => nr_new_acks += 1,
                crate::wire::SoftAck::Nack => {
                    let nack_seq = first_soft_ack.wrapping_add(i as u32);
                    if !saw_nacks && self.tx_window.acks_lowest_nak() != nack_seq {
                        new_low_nack = true;
                    }
                    saw_nacks = true;
                }
            }
        }

        // Step 11: ping-for-lost-reply.
        let all_acked =
            nr_acks == self.tx_window.tx_top().wrapping_sub(hard_ack);
        if self.flags.test(TX_LAST) && all_acked && self.phase.is_client() {
            collabs.propose_ping(ack_serial, ack_serial as ProposeTag);
        }

        // Step 12: congestion.
        let summary = AckSummary {
            nr_new_acks,
            nr_rot_new_acks,
            saw_nacks,
            new_low_nack,
            flight_size: self.tx_window.flight_size(hard_ack, nr_acks),
            retrans_timeout: self.flags.test_and_clear(RETRANS_TIMEOUT),
            all_acked_and_tx_last_pending: self.flags.test(TX_LAST) && all_acked,
        };
        let mode_before = self.congestion.mode();
        let outcome = self
            .congestion
            .on_ack(&summary, now, srtt, self.peer_rtt_count);
        if outcome.mode != mode_before {
            debug!(from = ?mode_before, to = ?outcome.mode, "congestion mode changed");
        }
        if outcome.resend {
            debug!("congestion controller requested resend");
            collabs.request_resend();
        }

        Ok(Disposition::AckProcessed)
    }
}

/// `ECONNRESET`, used verbatim as the errno surfaced by the NAT/migration
/// transport-reset shortcut (spec.md §4.4 step 4 / §7).
fn libc_econnreset() -> i32 {
    104
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_support::RecordingCollaborators;
    use crate::wire::{AckInfo, FLAG_LAST, FLAG_REQUEST_ACK, SoftAck};
    use bytes::{BufMut, BytesMut};

    fn header(ptype: PacketType, seq: u32, serial: u32, flags: u8) -> WireHeader {
        WireHeader {
            packet_type: ptype,
            flags,
            seq,
            serial,
            service_id: 1,
            security_index: 0,
        }
    }

    fn encode_ack(body: &AckBody) -> Bytes {
        let mut buf = BytesMut::new();
        body.encode(&mut buf).unwrap();
        buf.freeze()
    }

    #[test]
    fn in_order_data_delivers_and_acks_delay_when_pending() {
        let mut call = Call::new(CallConfig::default(), Phase::ServerRecvRequest, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let h = header(PacketType::Data, 1, 10, 0);
        let disp = call
            .receive(h, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        assert_eq!(disp, Disposition::Admitted { delivered: 1 });
        assert_eq!(collabs.recorded.delay_acks.len(), 1);
        assert_eq!(collabs.recorded.notifications, 1);
    }

    #[test]
    fn request_ack_flag_gets_immediate_requested_ack() {
        let mut call = Call::new(CallConfig::default(), Phase::ServerRecvRequest, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let h = header(PacketType::Data, 1, 10, FLAG_REQUEST_ACK);
        call.receive(h, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        assert_eq!(collabs.recorded.acks_sent, vec![(AckReason::Requested, 10)]);
    }

    #[test]
    fn exceeds_window_does_not_change_queue() {
        let cfg = CallConfig {
            rx_winsize: 4,
            ..CallConfig::default()
        };
        let mut call = Call::new(cfg, Phase::ServerRecvRequest, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let h = header(PacketType::Data, 100, 5, 0);
        let disp = call
            .receive(h, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        assert_eq!(disp, Disposition::Admitted { delivered: 0 });
        assert_eq!(
            collabs.recorded.acks_sent,
            vec![(AckReason::ExceedsWindow, 5)]
        );
    }

    #[test]
    fn ack_rotates_tx_window_and_counts_rotated_acks() {
        let mut call = Call::new(CallConfig::default(), Phase::ClientSendRequest, Instant::now());
        let now = Instant::now();
        for seq in 1..=10u32 {
            call.note_sent(seq, seq == 10, now);
        }
        let mut collabs = RecordingCollaborators::default();

        let body = AckBody {
            serial: 1,
            first_packet: 7,
            previous_packet: 0,
            reason: AckReason::Delay,
            acks: vec![],
            info: None,
        };
        let h = header(PacketType::Ack, 0, 1, 0);
        call.receive(
            h,
            encode_ack(&body),
            &mut collabs,
            now,
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(call.tx_window().load_hard_ack(), 6);
        assert!(!call.flags().test(TX_LAST));
    }

    #[test]
    fn ack_all_rotates_everything_and_completes_server_await_ack() {
        let mut call = Call::new(CallConfig::default(), Phase::ServerAwaitAck, Instant::now());
        let now = Instant::now();
        for seq in 1..=5u32 {
            call.note_sent(seq, seq == 5, now);
        }
        let mut collabs = RecordingCollaborators::default();
        let h = header(PacketType::AckAll, 0, 1, 0);
        let disp = call
            .receive(h, Bytes::new(), &mut collabs, now, Duration::from_millis(100))
            .unwrap();
        assert_eq!(disp, Disposition::AckAll);
        assert_eq!(call.phase(), Phase::Complete(CompletionKind::Success));
        assert_eq!(collabs.recorded.completions.len(), 1);
    }

    #[test]
    fn abort_packet_completes_call_with_remote_code() {
        let mut call = Call::new(CallConfig::default(), Phase::ClientAwaitReply, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let mut buf = BytesMut::new();
        buf.put_u32(42);
        let h = header(PacketType::Abort, 0, 0, 0);
        let disp = call
            .receive(h, buf.freeze(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        assert_eq!(disp, Disposition::RemoteAbort);
        assert_eq!(
            collabs.recorded.completions[0],
            (CompletionKind::RemotelyAborted, 42, 0)
        );
    }

    #[test]
    fn busy_is_ignored_not_aborted() {
        let mut call = Call::new(CallConfig::default(), Phase::ClientSendRequest, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let h = header(PacketType::Busy, 0, 0, 0);
        let disp = call
            .receive(h, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        assert_eq!(disp, Disposition::BusyIgnored);
        assert!(collabs.recorded.aborts.is_empty());
    }

    #[test]
    fn nat_reset_shortcut_completes_client_call() {
        let mut call = Call::new(CallConfig::default(), Phase::ClientAwaitReply, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let body = AckBody {
            serial: 1,
            first_packet: 1,
            previous_packet: 0,
            reason: AckReason::ExceedsWindow,
            acks: vec![],
            info: None,
        };
        let h = header(PacketType::Ack, 0, 1, 0);
        let disp = call
            .receive(
                h,
                encode_ack(&body),
                &mut collabs,
                Instant::now(),
                Duration::from_millis(100),
            )
            .unwrap();
        assert_eq!(disp, Disposition::Completed);
        assert_eq!(call.phase(), Phase::Complete(CompletionKind::RemotelyAborted));
    }

    #[test]
    fn ack_with_ackinfo_clamps_rwind_and_tracks_mtu() {
        let mut call = Call::new(CallConfig::default(), Phase::ClientSendRequest, Instant::now());
        let now = Instant::now();
        call.note_sent(1, true, now);
        let mut collabs = RecordingCollaborators::default();
        let body = AckBody {
            serial: 1,
            first_packet: 1,
            previous_packet: 0,
            reason: AckReason::Delay,
            acks: vec![],
            info: Some(AckInfo {
                rx_mtu: 1000,
                max_mtu: 1412,
                rwind: 9999,
                jumbo_max: 4,
            }),
        };
        let h = header(PacketType::Ack, 0, 1, 0);
        call.receive(
            h,
            encode_ack(&body),
            &mut collabs,
            now,
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(call.peer_rwind, Some(CallConfig::default().tx_max_window));
        assert_eq!(call.peer_mtu, Some(1000));
    }

    #[test]
    fn duplicate_last_packet_mismatch_aborts_lsa() {
        let mut call = Call::new(CallConfig::default(), Phase::ServerRecvRequest, Instant::now());
        let mut collabs = RecordingCollaborators::default();
        let h1 = header(PacketType::Data, 5, 1, FLAG_LAST);
        call.receive(h1, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100))
            .unwrap();
        let h2 = header(PacketType::Data, 6, 2, 0);
        let err = call.receive(h2, Bytes::new(), &mut collabs, Instant::now(), Duration::from_millis(100));
        assert!(matches!(err, Err(CallError::Protocol(ProtocolAbort::Lsa))));
        assert!(call.flags().test(IS_DEAD));
    }
}
