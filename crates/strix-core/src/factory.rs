//! Packet factory: maps the 4-bit type discriminant to a fresh packet.

use crate::error::DecodeError;
use crate::packet::{
    ConnAckPacket, ConnectPacket, DisconnectPacket, Packet, PingReqPacket, PingRespPacket,
    PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket, PublishPacket, SubAckPacket,
    SubscribePacket, UnsubAckPacket, UnsubscribePacket,
};

/// Builds fresh, empty packet instances from a type discriminant.
///
/// This is the extension point for vendor-specific packet types: hand the
/// stream parser a custom factory and it will route unknown discriminants
/// through it before giving up.
pub trait PacketFactory {
    /// Build a fresh instance of the packet type with the given 4-bit
    /// discriminant.
    ///
    /// Fails with [`DecodeError::UnknownPacketType`] for unrecognized codes.
    fn build(&self, discriminant: u8) -> Result<Packet, DecodeError>;
}

/// Factory covering the 14 standard control-packet types.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPacketFactory;

impl PacketFactory for DefaultPacketFactory {
    fn build(&self, discriminant: u8) -> Result<Packet, DecodeError> {
        Ok(match discriminant {
            1 => ConnectPacket::default().into(),
            2 => ConnAckPacket::default().into(),
            3 => PublishPacket::default().into(),
            4 => PubAckPacket::default().into(),
            5 => PubRecPacket::default().into(),
            6 => PubRelPacket::default().into(),
            7 => PubCompPacket::default().into(),
            8 => SubscribePacket::default().into(),
            9 => SubAckPacket::default().into(),
            10 => UnsubscribePacket::default().into(),
            11 => UnsubAckPacket::default().into(),
            12 => PingReqPacket::default().into(),
            13 => PingRespPacket::default().into(),
            14 => DisconnectPacket::default().into(),
            _ => return Err(DecodeError::UnknownPacketType(discriminant)),
        })
    }
}
