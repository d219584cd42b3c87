//! Bit-exact, big-endian wire formats: `wire_header`, `ack_body`,
//! `abort_body`, and the jumbo subpacket header.
//!
//! The `BinaryReader`/`BinaryWriter` extension traits below are adapted
//! from the legacy `src/utils/binary.rs` module (trimmed to the
//! fixed-width big-endian accessors this codec needs); that module sits
//! outside the workspace so its traits can't be depended on directly.

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("not enough bytes in buffer: needed {needed}, remaining {remaining}")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("unknown ack reason {0}")]
    UnknownAckReason(u8),
}

type Result<T> = std::result::Result<T, WireError>;

macro_rules! check_remaining {
    ($buf:expr, $len:expr) => {{
        let needed = $len;
        let remaining = $buf.remaining();
        if remaining < needed {
            return Err(WireError::UnexpectedEof { needed, remaining });
        }
    }};
}

/// Extension trait over `bytes::Buf` for the fixed-width big-endian fields
/// the wire formats in this module are built from.
pub trait BinaryReader: Buf {
    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        check_remaining!(self, 1);
        Ok(self.get_u8())
    }

    #[inline]
    fn read_u16_be(&mut self) -> Result<u16> {
        check_remaining!(self, 2);
        Ok(self.get_u16())
    }

    #[inline]
    fn read_u32_be(&mut self) -> Result<u32> {
        check_remaining!(self, 4);
        Ok(self.get_u32())
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        check_remaining!(self, len);
        Ok(self.copy_to_bytes(len))
    }
}

impl<T: Buf> BinaryReader for T {}

/// Extension trait over `bytes::BufMut` for the fixed-width big-endian
/// fields the wire formats in this module are built from.
pub trait BinaryWriter: BufMut {
    #[inline]
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put_u8(value);
        Ok(())
    }

    #[inline]
    fn write_u16_be(&mut self, value: u16) -> Result<()> {
        self.put_u16(value);
        Ok(())
    }

    #[inline]
    fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.put_u32(value);
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_slice(bytes);
        Ok(())
    }
}

impl<T: BufMut> BinaryWriter for T {}

pub const FLAG_REQUEST_ACK: u8 = 0x01;
pub const FLAG_LAST: u8 = 0x02;
pub const FLAG_JUMBO: u8 = 0x04;

pub const JUMBO_DATALEN: usize = 1412;
/// `flags:u8, _rsvd:u16 be` trailing every subpacket but the tail.
pub const JUMBO_HEADER_LEN: usize = 3;
pub const JUMBO_SUBPKTLEN: usize = JUMBO_DATALEN + JUMBO_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Data = 0,
    Ack = 1,
    AckAll = 2,
    Abort = 3,
    Busy = 4,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Ack),
            2 => Ok(PacketType::AckAll),
            3 => Ok(PacketType::Abort),
            4 => Ok(PacketType::Busy),
            other => Err(WireError::UnknownPacketType(other)),
        }
    }
}

/// Parsed `wire_header`. Framing bytes beyond these fields (security
/// checksum, etc.) are the demuxer's concern and never reach this crate.
#[derive(Debug, Clone, Copy)]
pub struct WireHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub seq: u32,
    pub serial: u32,
    pub service_id: u16,
    pub security_index: u8,
}

impl WireHeader {
    pub const ENCODED_LEN: usize = 1 + 1 + 4 + 4 + 2 + 1;

    pub fn request_ack(&self) -> bool {
        self.flags & FLAG_REQUEST_ACK != 0
    }

    pub fn last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }

    pub fn jumbo(&self) -> bool {
        self.flags & FLAG_JUMBO != 0
    }

    pub fn decode(reader: &mut impl BinaryReader) -> Result<Self> {
        let packet_type = PacketType::from_u8(reader.read_u8()?)?;
        let flags = reader.read_u8()?;
        let seq = reader.read_u32_be()?;
        let serial = reader.read_u32_be()?;
        let service_id = reader.read_u16_be()?;
        let security_index = reader.read_u8()?;
        Ok(Self {
            packet_type,
            flags,
            seq,
            serial,
            service_id,
            security_index,
        })
    }

    pub fn encode(&self, writer: &mut impl BinaryWriter) -> Result<()> {
        writer.write_u8(self.packet_type as u8)?;
        writer.write_u8(self.flags)?;
        writer.write_u32_be(self.seq)?;
        writer.write_u32_be(self.serial)?;
        writer.write_u16_be(self.service_id)?;
        writer.write_u8(self.security_index)?;
        Ok(())
    }
}

/// Reason carried on an outbound or inbound ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckReason {
    Requested = 0,
    Duplicate = 1,
    OutOfSequence = 2,
    ExceedsWindow = 3,
    NoSpace = 4,
    Ping = 5,
    PingResponse = 6,
    Delay = 7,
}

impl AckReason {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AckReason::Requested),
            1 => Ok(AckReason::Duplicate),
            2 => Ok(AckReason::OutOfSequence),
            3 => Ok(AckReason::ExceedsWindow),
            4 => Ok(AckReason::NoSpace),
            5 => Ok(AckReason::Ping),
            6 => Ok(AckReason::PingResponse),
            7 => Ok(AckReason::Delay),
            other => Err(WireError::UnknownAckReason(other)),
        }
    }
}

/// One byte of the soft-ACK table: `Ack` (value 1) or `Nack` (anything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftAck {
    Ack,
    Nack,
}

impl SoftAck {
    fn from_byte(b: u8) -> Self {
        if b == 1 { SoftAck::Ack } else { SoftAck::Nack }
    }

    fn to_byte(self) -> u8 {
        match self {
            SoftAck::Ack => 1,
            SoftAck::Nack => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AckInfo {
    pub rx_mtu: u32,
    pub max_mtu: u32,
    pub rwind: u32,
    pub jumbo_max: u32,
}

impl AckInfo {
    pub const ENCODED_LEN: usize = 16;

    pub fn decode(reader: &mut impl BinaryReader) -> Result<Self> {
        Ok(Self {
            rx_mtu: reader.read_u32_be()?,
            max_mtu: reader.read_u32_be()?,
            rwind: reader.read_u32_be()?,
            jumbo_max: reader.read_u32_be()?,
        })
    }

    pub fn encode(&self, writer: &mut impl BinaryWriter) -> Result<()> {
        writer.write_u32_be(self.rx_mtu)?;
        writer.write_u32_be(self.max_mtu)?;
        writer.write_u32_be(self.rwind)?;
        writer.write_u32_be(self.jumbo_max)?;
        Ok(())
    }
}

/// `ack_header | acks:u8[nAcks] | 3 bytes padding | optional ackinfo`.
#[derive(Debug, Clone)]
pub struct AckBody {
    pub serial: u32,
    pub first_packet: u32,
    pub previous_packet: u32,
    pub reason: AckReason,
    pub acks: Vec<SoftAck>,
    pub info: Option<AckInfo>,
}

impl AckBody {
    pub const HEADER_LEN: usize = 4 + 4 + 4 + 1 + 1;
    const PAD_LEN: usize = 3;

    pub fn decode(reader: &mut impl BinaryReader) -> Result<Self> {
        let serial = reader.read_u32_be()?;
        let first_packet = reader.read_u32_be()?;
        let previous_packet = reader.read_u32_be()?;
        let reason = AckReason::from_u8(reader.read_u8()?)?;
        let nr_acks = reader.read_u8()? as usize;

        let raw = reader.read_bytes(nr_acks)?;
        let acks = raw.iter().map(|b| SoftAck::from_byte(*b)).collect();

        let info = if reader.remaining() >= Self::PAD_LEN + AckInfo::ENCODED_LEN {
            let _pad = reader.read_bytes(Self::PAD_LEN)?;
            Some(AckInfo::decode(reader)?)
        } else {
            None
        };

        Ok(Self {
            serial,
            first_packet,
            previous_packet,
            reason,
            acks,
            info,
        })
    }

    pub fn encode(&self, writer: &mut impl BinaryWriter) -> Result<()> {
        writer.write_u32_be(self.serial)?;
        writer.write_u32_be(self.first_packet)?;
        writer.write_u32_be(self.previous_packet)?;
        writer.write_u8(self.reason as u8)?;
        writer.write_u8(self.acks.len() as u8)?;
        for ack in &self.acks {
            writer.write_u8(ack.to_byte())?;
        }
        if let Some(info) = &self.info {
            writer.write_bytes(&[0u8; Self::PAD_LEN])?;
            info.encode(writer)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AbortBody {
    pub abort_code: u32,
}

impl AbortBody {
    pub fn decode(reader: &mut impl BinaryReader) -> Result<Self> {
        Ok(Self {
            abort_code: reader.read_u32_be()?,
        })
    }

    pub fn encode(&self, writer: &mut impl BinaryWriter) -> Result<()> {
        writer.write_u32_be(self.abort_code)?;
        Ok(())
    }
}

/// The 3-byte header that follows each jumbo subpacket's `JUMBO_DATALEN`
/// bytes of payload.
#[derive(Debug, Clone, Copy)]
pub struct JumboSubHeader {
    pub flags: u8,
    pub reserved: u16,
}

impl JumboSubHeader {
    pub fn decode(reader: &mut impl BinaryReader) -> Result<Self> {
        let flags = reader.read_u8()?;
        let reserved = reader.read_u16_be()?;
        Ok(Self { flags, reserved })
    }

    pub fn encode(&self, writer: &mut impl BinaryWriter) -> Result<()> {
        writer.write_u8(self.flags)?;
        writer.write_u16_be(self.reserved)?;
        Ok(())
    }

    pub fn jumbo(&self) -> bool {
        self.flags & FLAG_JUMBO != 0
    }

    pub fn last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn wire_header_round_trip() {
        let header = WireHeader {
            packet_type: PacketType::Data,
            flags: FLAG_REQUEST_ACK | FLAG_LAST,
            seq: 7,
            serial: 99,
            service_id: 42,
            security_index: 0,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), WireHeader::ENCODED_LEN);

        let mut reader = buf.freeze();
        let decoded = WireHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.serial, 99);
        assert!(decoded.request_ack());
        assert!(decoded.last());
        assert!(!decoded.jumbo());
    }

    #[test]
    fn ack_body_round_trip_with_info() {
        let body = AckBody {
            serial: 5,
            first_packet: 7,
            previous_packet: 6,
            reason: AckReason::Delay,
            acks: vec![SoftAck::Ack, SoftAck::Nack, SoftAck::Ack],
            info: Some(AckInfo {
                rx_mtu: 1412,
                max_mtu: 1412,
                rwind: 32,
                jumbo_max: 4,
            }),
        };
        let mut buf = BytesMut::new();
        body.encode(&mut buf).unwrap();

        let mut reader = buf.freeze();
        let decoded = AckBody::decode(&mut reader).unwrap();
        assert_eq!(decoded.first_packet, 7);
        assert_eq!(decoded.acks.len(), 3);
        assert_eq!(decoded.acks[1], SoftAck::Nack);
        assert_eq!(decoded.info.unwrap().rwind, 32);
    }

    #[test]
    fn ack_body_without_info_has_no_trailing_read() {
        let body = AckBody {
            serial: 1,
            first_packet: 1,
            previous_packet: 0,
            reason: AckReason::Requested,
            acks: vec![],
            info: None,
        };
        let mut buf = BytesMut::new();
        body.encode(&mut buf).unwrap();
        let mut reader = buf.freeze();
        let decoded = AckBody::decode(&mut reader).unwrap();
        assert!(decoded.info.is_none());
        assert!(!reader.has_remaining());
    }

    #[test]
    fn unknown_packet_type_is_an_error() {
        let mut buf = Bytes::from_static(&[0xFF]);
        assert!(matches!(
            PacketType::from_u8(buf.get_u8()),
            Err(WireError::UnknownPacketType(0xFF))
        ));
    }
}
