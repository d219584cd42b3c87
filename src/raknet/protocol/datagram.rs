// src/raknet/protocol/datagram.rs
//! Structures related to RakNet datagrams and encapsulated packets.

use crate::utils::binary::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};

// --- Constants ---
pub const FLAG_VALID: u8 = 0x80;
pub const FLAG_ACK: u8 = 0x40;
pub const FLAG_NACK: u8 = 0x20;
// --- Not directly used by amethyst currently but part of protocol spec ---
// pub const FLAG_PACKET_PAIR: u8 = 0x10; // Deprecated or unused in modern RakNet?
// pub const FLAG_CONTINUOUS_SEND: u8 = 0x08; // Internal flag, seems related to split packets needing immediate followup
pub const FLAG_NEEDS_B_AND_AS: u8 = 0x04; // Internal flag related to bandwidth/ack management, MC uses it often


// --- Packet Structures ---

/// Represents a RakNet datagram containing one or more EncapsulatedPackets.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Combination of flags (FLAG_VALID, FLAG_ACK, FLAG_NACK, etc.).
    pub header_flags: u8,
    /// Sequence number for this datagram (used for ACK/NACK).
    pub sequence_number: u32, // Stored as LE Triad (u24)
    /// The encapsulated packets carried within this datagram.
    pub packets: Vec<EncapsulatedPacket>,

    // --- Metadata (not part of encoded packet) ---
    /// Time the datagram was sent (for RTT calculation). Set by sender.
    pub send_time: Option<std::time::Instant>,
    /// Next allowed send time based on congestion control. Set by sender.
    pub next_send_time: Option<std::time::Instant>,
    /// Size of the datagram in bytes for congestion control calculation. Set by sender.
    pub size_for_congestion_control: Option<usize>
}

impl Datagram {
    /// Creates a new, empty Datagram.
    pub fn new(sequence_number: u32) -> Self {
        Self {
            header_flags: FLAG_VALID | FLAG_NEEDS_B_AND_AS, // Default flags for data datagrams
            sequence_number,
            packets: Vec::new(),
            send_time: None,
            next_send_time: None,
            size_for_congestion_control: None
        }
    }

    /// Decodes a Datagram from a byte slice.
    pub fn decode(reader: &mut Bytes) -> Result<Self, BinaryError> {
        if reader.remaining() < 4 { // Min size: flags(1) + seq_num(3)
            return Err(BinaryError::UnexpectedEof { needed: 4, remaining: reader.remaining() });
        }
        let header_flags = reader.get_u8();
        if (header_flags & FLAG_VALID) == 0 {
            return Err(BinaryError::InvalidData("Invalid datagram: VALID flag not set".into()));
        }

        let sequence_number = reader.read_u24_le()?;
        let mut packets = Vec::new();

        while reader.has_remaining() {
            packets.push(EncapsulatedPacket::decode(reader)?);
        }

        Ok(Self {
            header_flags,
            sequence_number,
            packets,
            send_time: None,
            next_send_time: None,
            size_for_congestion_control: None
        })
    }

    /// Encodes the Datagram into a BytesMut buffer.
    pub fn encode(&self, writer: &mut BytesMut) -> Result<(), BinaryError> {
        writer.put_u8(self.header_flags);
        writer.write_u24_le(self.sequence_number)?;

        for packet in &self.packets {
            packet.encode(writer)?;
        }
        Ok(())
    }

    /// Calculates the encoded size of the datagram, including headers and all encapsulated packets.
    pub fn calculate_size(&self) -> usize {
        let mut size = 1 + 3; // Flags (1) + Sequence Number (3)
        for packet in &self.packets {
            size += packet.calculate_size();
        }
        size
    }
}

/// Represents a single packet encapsulated within a RakNet Datagram.
#[derive(Debug, Clone)]
pub struct EncapsulatedPacket {
    pub reliability: Reliability,
    pub is_split: bool,
    // --- Reliability dependent fields ---
    /// Reliable message number (only for reliable variants).
    pub message_index: Option<u32>, // Stored as LE Triad (u24)
    /// Sequence number (only for sequenced variants).
    pub sequence_index: Option<u32>, // Stored as LE Triad (u24)
    /// Ordering index (only for ordered/sequenced variants).
    pub order_index: Option<u32>, // Stored as LE Triad (u24)
    /// Ordering channel (only for ordered/sequenced variants).
    pub order_channel: Option<u8>,
    // --- Split packet fields (only if is_split is true) ---
    /// Number of fragments this packet is split into.
    pub split_count: Option<u32>, // u32 BE
    /// ID shared among all fragments of the same split packet.
    pub split_id: Option<u16>, // u16 BE
    /// Index of this fragment (0-based).
    pub split_index: Option<u32>, // u32 BE
    // --- The actual payload ---
    pub buffer: Bytes,

    // --- Metadata ---
    /// ACK identifier for tracking send receipts. Not encoded.
    pub ack_id: Option<u32>
}

impl EncapsulatedPacket {
    /// Decodes an EncapsulatedPacket from a buffer.
    pub fn decode(reader: &mut Bytes) -> Result<Self, BinaryError> {
        if reader.remaining() < 3 { // flags (1) + len (2)
            return Err(BinaryError::UnexpectedEof { needed: 3, remaining: reader.remaining() });
        }
        let flags = reader.get_u8();
        let reliability = Reliability::from_u8(flags >> 5)?; // Top 3 bits
        let is_split = (flags & 0x10) != 0;
        let _needs_b_and_as = (flags & 0x04) != 0; // Seems less used internally now?


        let length_bits = reader.read_u16_be()?;
        let length_bytes = ((length_bits + 7) / 8) as usize; // Round up to nearest byte

        let mut message_index = None;
        let mut sequence_index = None;
        let mut order_index = None;
        let mut order_channel = None;

        if reliability.is_reliable() {
            message_index = Some(reader.read_u24_le()?);
        }
        if reliability.is_sequenced() {
            sequence_index = Some(reader.read_u24_le()?);
        }
        if reliability.is_ordered() || reliability.is_sequenced() {
            order_index = Some(reader.read_u24_le()?);
            order_channel = Some(reader.read_u8()?);
        }


        let mut split_count = None;
        let mut split_id = None;
        let mut split_index = None;

        if is_split {
            split_count = Some(reader.read_u32_be()?);
            split_id = Some(reader.read_u16_be()?);
            split_index = Some(reader.read_u32_be()?);
        }


        if reader.remaining() < length_bytes {
            return Err(BinaryError::UnexpectedEof { needed: length_bytes, remaining: reader.remaining() });
        }
        let buffer = reader.copy_to_bytes(length_bytes);

        Ok(Self {
            reliability,
            is_split,
            message_index,
            sequence_index,
            order_index,
            order_channel,
            split_count,
            split_id,
            split_index,
            buffer,
            ack_id: None, // Not encoded
        })
    }

    /// Encodes the EncapsulatedPacket into a buffer.
    pub fn encode(&self, writer: &mut BytesMut) -> Result<(), BinaryError> {
        let mut flags = (self.reliability as u8) << 5;
        if self.is_split {
            flags |= 0x10;
        }
        // Note: FLAG_NEEDS_B_AND_AS might be needed by Minecraft, but adding it unconditionally
        // might not be correct for all RakNet usage. Add if required by testing/protocol.
        // flags |= FLAG_NEEDS_B_AND_AS;


        writer.put_u8(flags);

        let length_bits = self.buffer.len() * 8;
        if length_bits > u16::MAX as usize {
            // Should realistically not happen with MTU splitting, but check anyway.
            return Err(BinaryError::InvalidData(format!(
                "Encapsulated packet buffer too large: {} bytes",
                self.buffer.len()
            )));
        }
        writer.write_u16_be(length_bits as u16)?;

        if self.reliability.is_reliable() {
            writer.write_u24_le(self.message_index.ok_or(BinaryError::InvalidData(
                "Missing message_index for reliable packet".to_string(),
            ))?)?;
        }

        if self.reliability.is_sequenced() {
            writer.write_u24_le(self.sequence_index.ok_or(BinaryError::InvalidData(
                "Missing sequence_index for sequenced packet".to_string(),
            ))?)?;
        }

        if self.reliability.is_ordered() || self.reliability.is_sequenced() {
            writer.write_u24_le(self.order_index.ok_or(BinaryError::InvalidData(
                "Missing order_index for ordered/sequenced packet".to_string(),
            ))?)?;
            writer.write_u8(self.order_channel.ok_or(BinaryError::InvalidData(
                "Missing order_channel for ordered/sequenced packet".to_string(),
            ))?)?;
        }


        if self.is_split {
            writer.write_u32_be(self.split_count.ok_or(BinaryError::InvalidData(
                "Missing split_count for split packet".to_string(),
            ))?)?;
            writer.write_u16_be(self.split_id.ok_or(BinaryError::InvalidData(
                "Missing split_id for split packet".to_string(),
            ))?)?;
            writer.write_u32_be(self.split_index.ok_or(BinaryError::InvalidData(
                "Missing split_index for split packet".to_string(),
            ))?)?;
        }


        writer.put(self.buffer.clone()); // Clone Bytes for encoding

        Ok(())
    }

    /// Calculates the header size of the encapsulated packet based on its reliability and split status.
    pub fn header_size(&self) -> usize {
        let mut size = 1 + 2; // Flags (1) + Length (2)
        if self.reliability.is_reliable() {
            size += 3; // message_index
        }
        if self.reliability.is_sequenced() {
            size += 3; // sequence_index
        }
        if self.reliability.is_ordered() || self.reliability.is_sequenced() {
            size += 3 + 1; // order_index + order_channel
        }
        if self.is_split {
            size += 4 + 2 + 4; // split_count + split_id + split_index
        }
        size
    }


    /// Calculates the total size of the encoded encapsulated packet (header + buffer).
    pub fn calculate_size(&self) -> usize {
        self.header_size() + self.buffer.len()
    }

    /// Creates a simple EncapsulatedPacket with default reliability (ReliableOrdered) and no splitting.
    pub fn simple(buffer: Bytes, message_index: Option<u32>, order_index: Option<u32>) -> Self {
        Self {
            reliability: Reliability::ReliableOrdered, // Common default for game packets
            is_split: false,
            message_index,
            sequence_index: None,
            order_index,
            order_channel: Some(0), // Default channel 0
            split_count: None,
            split_id: None,
            split_index: None,
            buffer,
            ack_id: None
        }
    }

}

/// Enum representing RakNet packet reliability types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Reliability {
    Unreliable = 0,
    UnreliableSequenced = 1,
    Reliable = 2,
    ReliableOrdered = 3,
    ReliableSequenced = 4,
    UnreliableWithAckReceipt = 5, // Often mapped to Unreliable? Need to confirm MCBE usage
    ReliableWithAckReceipt = 6,   // Often mapped to Reliable?
    ReliableOrderedWithAckReceipt = 7, // Often mapped to ReliableOrdered?
}

impl Reliability {
    pub fn from_u8(val: u8) -> Result<Self, BinaryError> {
        Self::try_from(val).map_err(|_| BinaryError::InvalidData(format!("Invalid reliability ID: {}", val)))
    }

    /// Returns `true` if the reliability type requires a message index (Reliable*).
    #[inline]
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Reliability::Reliable
                | Reliability::ReliableOrdered
                | Reliability::ReliableSequenced
                | Reliability::ReliableWithAckReceipt
                | Reliability::ReliableOrderedWithAckReceipt
                | Reliability::ReliableOrdered // Added missing variant that should be reliable
                // Consider ReliableSequencedWithAckReceipt if added later
        )
    }

    /// Returns `true` if the reliability type uses ordering (ReliableOrdered*).
    #[inline]
    pub fn is_ordered(self) -> bool {
        matches!(self, Reliability::ReliableOrdered | Reliability::ReliableOrderedWithAckReceipt)
    }

    /// Returns `true` if the reliability type uses sequencing (*Sequenced).
    #[inline]
    pub fn is_sequenced(self) -> bool {
        matches!(self, Reliability::UnreliableSequenced | Reliability::ReliableSequenced)
        // Should include ReliableSequencedWithAckReceipt if that's ever defined/used
    }

    /// Returns `true` if the packet needs an ordering channel and index.
    #[inline]
    pub fn needs_ordering_info(self) -> bool {
        self.is_ordered() || self.is_sequenced()
    }
}
