//! The unit the receive window and jumbo splitter operate on: a sequence
//! number, its flag byte, and a payload slice. Subpackets produced by the
//! jumbo splitter are themselves `Packet`s sharing the parent buffer.

use crate::wire::{FLAG_JUMBO, FLAG_LAST, FLAG_REQUEST_ACK};
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct Packet {
    pub seq: u32,
    pub flags: u8,
    /// The serial this subpacket should be ACK'd/traced under. Equal to the
    /// wire header's serial for a non-jumbo packet; incremented once per
    /// subpacket for a split jumbo (spec.md §4.3).
    pub serial: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(seq: u32, flags: u8, serial: u32, payload: Bytes) -> Self {
        Self {
            seq,
            flags,
            serial,
            payload,
        }
    }

    pub fn request_ack(&self) -> bool {
        self.flags & FLAG_REQUEST_ACK != 0
    }

    pub fn last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }

    pub fn jumbo(&self) -> bool {
        self.flags & FLAG_JUMBO != 0
    }
}
