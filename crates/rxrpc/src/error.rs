//! Error taxonomy for the receive-side call engine.
//!
//! Mirrors the five kinds in the protocol design: a local protocol-abort
//! decision, a remotely-originated abort, a transport-reset shortcut, a
//! resource failure that drops a packet without killing the call, and an
//! externally-fired timeout consumed as a flag rather than an error value.

use thiserror::Error;

/// One local protocol-abort reason. The short tag is preserved verbatim so
/// logs and outbound ABORT packets match across the codebase.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolAbort {
    #[error("LSN")]
    Lsn,
    #[error("LSA")]
    Lsa,
    #[error("VLD")]
    Vld,
    #[error("TXL")]
    Txl,
    #[error("ETD")]
    Etd,
    #[error("XAK")]
    Xak,
    #[error("XAI")]
    Xai,
    #[error("XSA")]
    Xsa,
    #[error("AK0")]
    Ak0,
    #[error("AKW")]
    Akw,
    #[error("AKN")]
    Akn,
    #[error("IMP")]
    Imp,
}

impl ProtocolAbort {
    /// The short tag used in trace output and outbound ABORT packets.
    pub const fn tag(self) -> &'static str {
        match self {
            ProtocolAbort::Lsn => "LSN",
            ProtocolAbort::Lsa => "LSA",
            ProtocolAbort::Vld => "VLD",
            ProtocolAbort::Txl => "TXL",
            ProtocolAbort::Etd => "ETD",
            ProtocolAbort::Xak => "XAK",
            ProtocolAbort::Xai => "XAI",
            ProtocolAbort::Xsa => "XSA",
            ProtocolAbort::Ak0 => "AK0",
            ProtocolAbort::Akw => "AKW",
            ProtocolAbort::Akn => "AKN",
            ProtocolAbort::Imp => "IMP",
        }
    }
}

/// Top-level error produced while feeding a packet through the engine.
#[derive(Error, Debug)]
pub enum CallError {
    /// A local invariant was violated by the received data; the call has
    /// been (or is about to be) locally aborted with this reason.
    #[error("protocol abort: {0}")]
    Protocol(#[from] ProtocolAbort),

    /// The peer sent us an ABORT packet.
    #[error("remote abort, code {0}")]
    RemoteAbort(u32),

    /// A NAT/migration shortcut fired: the peer appears to have lost and
    /// recreated us before we hard-advanced past the first packet.
    #[error("transport reset")]
    TransportReset,

    /// Allocation or buffer-sharing failure while processing one packet;
    /// the packet is dropped but the call survives.
    #[error("resource error: {0}")]
    Resource(String),

    /// The wire data itself could not be parsed.
    #[error("wire error: {0}")]
    Wire(#[from] crate::wire::WireError),
}

/// Terminal reason a call completed, mirroring `RXRPC_CALL_COMPLETE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Success,
    LocallyAborted,
    RemotelyAborted,
    NetworkError,
    Expired,
}
