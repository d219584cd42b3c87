//! Phase state machine coupling a call's send and receive sides, per
//! spec.md §4.6. Client calls run request→await-reply→recv-reply; server
//! calls run recv-request→send-reply→await-ack. Both sides converge on a
//! `Complete` terminal state carrying a sub-reason.

use crate::error::{CompletionKind, ProtocolAbort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ClientSendRequest,
    ClientAwaitReply,
    ClientRecvReply,
    ServerRecvRequest,
    ServerAckRequest,
    ServerSendReply,
    ServerAwaitAck,
    Complete(CompletionKind),
}

impl Phase {
    pub fn is_client(self) -> bool {
        matches!(
            self,
            Phase::ClientSendRequest | Phase::ClientAwaitReply | Phase::ClientRecvReply
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete(_))
    }

    /// Whether ACK processing's Tx-window effects apply in this phase, per
    /// spec.md §4.4 step 8.
    pub fn accepts_tx_effects(self) -> bool {
        matches!(
            self,
            Phase::ClientSendRequest
                | Phase::ClientAwaitReply
                | Phase::ServerSendReply
                | Phase::ServerAwaitAck
        )
    }
}

/// Drives the end-of-Tx transition from spec.md §4.6. Only valid once
/// `TX_LAST` has been set by the caller; `reply_begun` distinguishes the
/// client's two possible predecessor phases.
pub fn end_of_tx_phase(phase: Phase, reply_begun: bool) -> Result<Phase, ProtocolAbort> {
    match phase {
        Phase::ClientSendRequest | Phase::ClientAwaitReply => {
            if reply_begun {
                Ok(Phase::ClientRecvReply)
            } else {
                Ok(Phase::ClientAwaitReply)
            }
        }
        Phase::ServerAwaitAck => Ok(Phase::Complete(CompletionKind::Success)),
        _ => Err(ProtocolAbort::Etd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_send_request_without_reply_moves_to_await_reply() {
        let next = end_of_tx_phase(Phase::ClientSendRequest, false).unwrap();
        assert_eq!(next, Phase::ClientAwaitReply);
    }

    #[test]
    fn client_await_reply_with_reply_begun_moves_to_recv_reply() {
        let next = end_of_tx_phase(Phase::ClientAwaitReply, true).unwrap();
        assert_eq!(next, Phase::ClientRecvReply);
    }

    #[test]
    fn server_await_ack_completes_normally() {
        let next = end_of_tx_phase(Phase::ServerAwaitAck, false).unwrap();
        assert_eq!(next, Phase::Complete(CompletionKind::Success));
    }

    #[test]
    fn any_other_phase_is_a_protocol_abort() {
        let err = end_of_tx_phase(Phase::ServerRecvRequest, false);
        assert_eq!(err, Err(ProtocolAbort::Etd));
    }
}
