//! Splits a jumbo DATA packet into its constituent subpackets.
//!
//! A jumbo packet is `JUMBO_DATALEN`-byte subpackets, each followed by a
//! 3-byte sub-header (`flags`, reserved), concatenated until one subpacket's
//! flags no longer carry `FLAG_JUMBO`; that final chunk is the non-jumbo
//! tail and is handed to [`crate::ack_window::AckWindow::admit`] like any
//! other packet. Sequence numbers increment by one per subpacket, starting
//! from the wire header's `seq`.

use crate::error::ProtocolAbort;
use crate::packet::Packet;
use crate::wire::{JumboSubHeader, JUMBO_HEADER_LEN};
use bytes::{Buf, Bytes};

/// One piece of a split jumbo (or the lone packet, if not jumbo at all).
pub struct Split {
    pub packets: Vec<Packet>,
}

/// Splits `payload` into subpackets per the jumbo wire format. `seq` and
/// `top_flags` are the wire header's own seq/flags (the flags of the first
/// subpacket, since the jumbo bit lives on the packet as a whole on the
/// wire but each subpacket re-states it via its own trailing sub-header).
/// `serial` is the wire header's own serial; each subpacket gets its own
/// serial incrementing from it, so ACKs/traces for a split jumbo reference
/// the subpacket that actually triggered them rather than the one serial
/// the jumbo arrived under. `datalen` is the call's configured
/// `JUMBO_DATALEN` (spec.md §6); callers pass `CallConfig::jumbo_datalen`.
pub fn split(
    seq: u32,
    top_flags: u8,
    serial: u32,
    mut payload: Bytes,
    datalen: usize,
) -> Result<Split, ProtocolAbort> {
    let mut packets = Vec::new();
    let mut cur_seq = seq;
    let mut cur_serial = serial;
    let mut cur_flags = top_flags;
    let subpktlen = datalen + JUMBO_HEADER_LEN;

    loop {
        let is_jumbo_chunk = cur_flags & crate::wire::FLAG_JUMBO != 0;

        if !is_jumbo_chunk {
            // The JUMBO flag cleared: this is the non-jumbo tail, whose
            // flags were announced by the previous subpacket's trailer.
            packets.push(Packet::new(cur_seq, cur_flags, cur_serial, payload));
            break;
        }

        if payload.remaining() < subpktlen {
            return Err(ProtocolAbort::Vld);
        }

        let data = payload.copy_to_bytes(datalen);
        let mut header_bytes = payload.copy_to_bytes(JumboSubHeader::decode_len());
        let sub_header = JumboSubHeader::decode(&mut header_bytes).map_err(|_| ProtocolAbort::Vld)?;

        // JUMBO may only combine with LAST on the tail chunk, never on a
        // trailer that still announces another subpacket to come.
        if sub_header.jumbo() && sub_header.last() {
            return Err(ProtocolAbort::Vld);
        }

        packets.push(Packet::new(cur_seq, cur_flags, cur_serial, data));

        cur_seq = cur_seq.wrapping_add(1);
        cur_serial = cur_serial.wrapping_add(1);
        cur_flags = sub_header.flags;
    }

    Ok(Split { packets })
}

impl JumboSubHeader {
    const fn decode_len() -> usize {
        JUMBO_HEADER_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{FLAG_JUMBO, FLAG_LAST, JUMBO_DATALEN};
    use bytes::{BufMut, BytesMut};

    fn sub_header(flags: u8) -> [u8; 3] {
        let mut buf = BytesMut::new();
        buf.put_u8(flags);
        buf.put_u16(0);
        buf.try_into().unwrap()
    }

    #[test]
    fn non_jumbo_payload_is_a_single_packet() {
        let payload = Bytes::from_static(b"hello");
        let result = split(1, 0, 100, payload, JUMBO_DATALEN).unwrap();
        assert_eq!(result.packets.len(), 1);
        assert_eq!(result.packets[0].seq, 1);
        assert_eq!(result.packets[0].serial, 100);
    }

    #[test]
    fn two_jumbo_subpackets_plus_tail_increment_seq_and_serial() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&vec![0xAAu8; JUMBO_DATALEN]);
        buf.extend_from_slice(&sub_header(FLAG_JUMBO));
        buf.extend_from_slice(&vec![0xBBu8; JUMBO_DATALEN]);
        buf.extend_from_slice(&sub_header(FLAG_LAST));
        buf.extend_from_slice(b"tail");

        let result = split(10, FLAG_JUMBO, 50, buf.freeze(), JUMBO_DATALEN).unwrap();
        assert_eq!(result.packets.len(), 3);
        assert_eq!(result.packets[0].seq, 10);
        assert_eq!(result.packets[1].seq, 11);
        assert_eq!(result.packets[2].seq, 12);
        assert_eq!(result.packets[0].serial, 50);
        assert_eq!(result.packets[1].serial, 51);
        assert_eq!(result.packets[2].serial, 52);
        assert!(result.packets[0].jumbo());
        assert!(result.packets[1].jumbo());
        assert!(!result.packets[2].jumbo());
        assert!(result.packets[2].last());
        assert!(!result.packets[0].last());
    }

    #[test]
    fn short_remaining_length_is_a_validation_error() {
        let payload = Bytes::from_static(b"too short");
        let err = split(1, FLAG_JUMBO, 1, payload, JUMBO_DATALEN);
        assert!(matches!(err, Err(ProtocolAbort::Vld)));
    }

    #[test]
    fn jumbo_and_last_combined_on_non_tail_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&vec![0xAAu8; JUMBO_DATALEN]);
        buf.extend_from_slice(&sub_header(FLAG_JUMBO | FLAG_LAST));
        let err = split(1, FLAG_JUMBO, 1, buf.freeze(), JUMBO_DATALEN);
        assert!(matches!(err, Err(ProtocolAbort::Vld)));
    }
}
