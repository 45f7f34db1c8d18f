//! Control-packet model: one variant per MQTT 3.1.1 packet type.
//!
//! Every packet knows how to serialize itself onto and deserialize itself
//! from a [`PacketBuffer`]. Reads consume exactly the remaining length
//! declared by the fixed header; writes serialize the variable header and
//! payload into a scratch buffer first so the remaining length can be
//! computed before the fixed header is emitted.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError, ValueError};
use rand::Rng;
use std::num::NonZeroU16;

mod ack;
mod connect;
mod publish;
mod simple;
mod subscribe;

pub use ack::{PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket, UnsubAckPacket};
pub use connect::{ConnAckPacket, ConnectPacket, ConnectReturnCode, Will};
pub use publish::PublishPacket;
pub use simple::{DisconnectPacket, PingReqPacket, PingRespPacket};
pub use subscribe::{SubAckPacket, SubackCode, SubscribePacket, UnsubscribePacket};

/// Packet types as defined by the protocol, keyed by the 4-bit discriminant
/// in the high nibble of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Client connection request
    Connect = 1,
    /// Connection acknowledgment
    ConnAck = 2,
    /// Publish a message
    Publish = 3,
    /// QoS 1 publish acknowledgment
    PubAck = 4,
    /// QoS 2 publish received (first phase)
    PubRec = 5,
    /// QoS 2 publish release (second phase)
    PubRel = 6,
    /// QoS 2 publish complete (final phase)
    PubComp = 7,
    /// Subscription request
    Subscribe = 8,
    /// Subscription acknowledgment
    SubAck = 9,
    /// Unsubscribe request
    Unsubscribe = 10,
    /// Unsubscribe acknowledgment
    UnsubAck = 11,
    /// Keepalive probe
    PingReq = 12,
    /// Keepalive response
    PingResp = 13,
    /// Graceful disconnect notification
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnAck),
            3 => Ok(Self::Publish),
            4 => Ok(Self::PubAck),
            5 => Ok(Self::PubRec),
            6 => Ok(Self::PubRel),
            7 => Ok(Self::PubComp),
            8 => Ok(Self::Subscribe),
            9 => Ok(Self::SubAck),
            10 => Ok(Self::Unsubscribe),
            11 => Ok(Self::UnsubAck),
            12 => Ok(Self::PingReq),
            13 => Ok(Self::PingResp),
            14 => Ok(Self::Disconnect),
            _ => Err(DecodeError::UnknownPacketType(value)),
        }
    }
}

/// Quality-of-service level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget, no acknowledgment
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery, may duplicate
    AtLeastOnce = 1,
    /// Two-phase-commit handshake, exactly once
    ExactlyOnce = 2,
}

impl QoS {
    /// Wire value of this level
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(DecodeError::InvalidQos(value)),
        }
    }
}

/// Packet-identifier slot embedded by value in every identifier-bearing
/// packet variant.
///
/// Holds "no identifier assigned yet" distinctly from any wire value; the
/// identifier invariant (never zero) is enforced at every entry point. On
/// write, an unassigned slot generates a random non-zero identifier once and
/// caches it. Uniqueness among concurrently pending identifiers is the
/// connection manager's concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketId {
    value: Option<NonZeroU16>,
}

impl PacketId {
    /// The assigned identifier, if any
    #[must_use]
    pub fn get(&self) -> Option<u16> {
        self.value.map(NonZeroU16::get)
    }

    /// Assign an identifier, rejecting zero
    pub fn set(&mut self, value: u16) -> Result<(), ValueError> {
        self.value = Some(NonZeroU16::new(value).ok_or(ValueError::ZeroPacketId)?);
        Ok(())
    }

    /// Return the assigned identifier, generating and caching a random
    /// non-zero one on first use
    pub fn get_or_generate(&mut self) -> u16 {
        match self.value {
            Some(value) => value.get(),
            None => {
                let generated = rand::thread_rng().gen_range(1..=u16::MAX);
                // 1..=MAX excludes zero
                self.value = NonZeroU16::new(generated);
                generated
            }
        }
    }

    /// Parse an identifier word from the wire
    pub(crate) fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let word = buffer.read_word()?;
        self.value = Some(NonZeroU16::new(word).ok_or(DecodeError::ZeroPacketId)?);
        Ok(())
    }

    /// Write the identifier word, generating one if unassigned
    pub(crate) fn write(&mut self, buffer: &mut PacketBuffer) {
        let value = self.get_or_generate();
        buffer.write_word(value);
    }
}

/// Parsed fixed header: type discriminant, flag nibble and remaining length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
}

impl FixedHeader {
    /// Parse the type byte and remaining-length field at the cursor.
    pub(crate) fn read(buffer: &mut PacketBuffer) -> Result<Self, DecodeError> {
        let start = buffer.position();
        let type_byte = buffer.read_byte()?;
        let packet_type = match PacketType::try_from(type_byte >> 4) {
            Ok(packet_type) => packet_type,
            Err(err) => {
                buffer.set_position(start);
                return Err(err);
            }
        };
        let remaining_length = match buffer.read_remaining_length() {
            Ok(length) => length,
            Err(err) => {
                buffer.set_position(start);
                return Err(err);
            }
        };
        Ok(Self {
            packet_type,
            flags: type_byte & 0x0F,
            remaining_length,
        })
    }

    /// Verify the parsed type matches the variant being decoded and that the
    /// whole declared body is buffered.
    pub(crate) fn expect(
        &self,
        expected: PacketType,
        buffer: &PacketBuffer,
    ) -> Result<(), DecodeError> {
        if self.packet_type != expected {
            return Err(DecodeError::UnexpectedPacketType {
                expected,
                actual: self.packet_type,
            });
        }
        if buffer.remaining() < self.remaining_length {
            return Err(DecodeError::EndOfStream);
        }
        Ok(())
    }

    /// Verify the flag nibble matches the type's mandated pattern.
    pub(crate) fn expect_flags(&self, expected: u8) -> Result<(), DecodeError> {
        if self.flags != expected {
            return Err(DecodeError::InvalidFlags {
                packet_type: self.packet_type,
                flags: self.flags,
            });
        }
        Ok(())
    }

    /// Verify the body consumed exactly the declared remaining length.
    pub(crate) fn expect_consumed(&self, consumed: usize) -> Result<(), DecodeError> {
        if consumed != self.remaining_length {
            return Err(DecodeError::LengthMismatch {
                declared: self.remaining_length,
                consumed,
            });
        }
        Ok(())
    }
}

/// Emit a fixed header plus a pre-serialized body.
///
/// The body buffer is the scratch into which the variable header and payload
/// were written; its length is the remaining length.
pub(crate) fn write_packet(
    buffer: &mut PacketBuffer,
    packet_type: PacketType,
    flags: u8,
    body: &PacketBuffer,
) -> Result<(), EncodeError> {
    buffer.write_byte(((packet_type as u8) << 4) | (flags & 0x0F));
    buffer.write_remaining_length(body.len())?;
    buffer.write(body.as_slice());
    Ok(())
}

/// A discriminated control packet.
///
/// Value object: packets copy topic and payload data out of the buffer at
/// parse time and own it independently afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Client connection request
    Connect(ConnectPacket),
    /// Connection acknowledgment
    ConnAck(ConnAckPacket),
    /// Publish a message
    Publish(PublishPacket),
    /// QoS 1 publish acknowledgment
    PubAck(PubAckPacket),
    /// QoS 2 publish received
    PubRec(PubRecPacket),
    /// QoS 2 publish release
    PubRel(PubRelPacket),
    /// QoS 2 publish complete
    PubComp(PubCompPacket),
    /// Subscription request
    Subscribe(SubscribePacket),
    /// Subscription acknowledgment
    SubAck(SubAckPacket),
    /// Unsubscribe request
    Unsubscribe(UnsubscribePacket),
    /// Unsubscribe acknowledgment
    UnsubAck(UnsubAckPacket),
    /// Keepalive probe
    PingReq(PingReqPacket),
    /// Keepalive response
    PingResp(PingRespPacket),
    /// Graceful disconnect notification
    Disconnect(DisconnectPacket),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Packet::Connect($inner) => $body,
            Packet::ConnAck($inner) => $body,
            Packet::Publish($inner) => $body,
            Packet::PubAck($inner) => $body,
            Packet::PubRec($inner) => $body,
            Packet::PubRel($inner) => $body,
            Packet::PubComp($inner) => $body,
            Packet::Subscribe($inner) => $body,
            Packet::SubAck($inner) => $body,
            Packet::Unsubscribe($inner) => $body,
            Packet::UnsubAck($inner) => $body,
            Packet::PingReq($inner) => $body,
            Packet::PingResp($inner) => $body,
            Packet::Disconnect($inner) => $body,
        }
    };
}

impl Packet {
    /// Type discriminant of this packet
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck(_) => PacketType::PubAck,
            Self::PubRec(_) => PacketType::PubRec,
            Self::PubRel(_) => PacketType::PubRel,
            Self::PubComp(_) => PacketType::PubComp,
            Self::Subscribe(_) => PacketType::Subscribe,
            Self::SubAck(_) => PacketType::SubAck,
            Self::Unsubscribe(_) => PacketType::Unsubscribe,
            Self::UnsubAck(_) => PacketType::UnsubAck,
            Self::PingReq(_) => PacketType::PingReq,
            Self::PingResp(_) => PacketType::PingResp,
            Self::Disconnect(_) => PacketType::Disconnect,
        }
    }

    /// Parse this packet's wire form at the buffer cursor.
    ///
    /// The cursor must sit on the fixed-header type byte. On success exactly
    /// the fixed header plus the declared remaining length have been
    /// consumed.
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        dispatch!(self, inner => inner.read(buffer))
    }

    /// Serialize this packet's wire form onto the buffer.
    ///
    /// Takes `&mut self` because identifier-bearing packets generate and
    /// cache their identifier on first write.
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        dispatch!(self, inner => inner.write(buffer))
    }

    /// Serialize into a fresh byte vector
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = PacketBuffer::new();
        self.write(&mut buffer)?;
        Ok(buffer.as_slice().to_vec())
    }

    /// The packet identifier, for variants that carry one on the wire.
    ///
    /// This is the value the connection manager routes acknowledgments by.
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Self::Publish(packet) => packet.packet_id(),
            Self::PubAck(packet) => packet.packet_id(),
            Self::PubRec(packet) => packet.packet_id(),
            Self::PubRel(packet) => packet.packet_id(),
            Self::PubComp(packet) => packet.packet_id(),
            Self::Subscribe(packet) => packet.packet_id(),
            Self::SubAck(packet) => packet.packet_id(),
            Self::Unsubscribe(packet) => packet.packet_id(),
            Self::UnsubAck(packet) => packet.packet_id(),
            _ => None,
        }
    }
}

macro_rules! packet_from {
    ($($variant:ident($inner:ty)),* $(,)?) => {
        $(
            impl From<$inner> for Packet {
                fn from(packet: $inner) -> Self {
                    Self::$variant(packet)
                }
            }
        )*
    };
}

packet_from! {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
}
