//! Identifier-only acknowledgment packets.
//!
//! PUBACK, PUBREC, PUBREL, PUBCOMP and UNSUBACK share one wire shape: a
//! fixed header plus a two-byte packet identifier. PUBREL is the odd one
//! out with a mandated flag nibble of `0b0010`; the rest require `0b0000`.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError, ValueError};
use crate::packet::{write_packet, FixedHeader, PacketId, PacketType};

macro_rules! identifier_packet {
    ($(#[$doc:meta])* $name:ident, $packet_type:expr, $flags:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            id: PacketId,
        }

        impl $name {
            /// Create a packet with the identifier unassigned
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Create a packet acknowledging the given identifier
            pub fn with_packet_id(id: u16) -> Result<Self, ValueError> {
                let mut packet = Self::default();
                packet.id.set(id)?;
                Ok(packet)
            }

            /// The packet identifier being acknowledged
            #[must_use]
            pub fn packet_id(&self) -> Option<u16> {
                self.id.get()
            }

            /// Assign the packet identifier, rejecting zero
            pub fn set_packet_id(&mut self, id: u16) -> Result<(), ValueError> {
                self.id.set(id)
            }

            /// Parse the wire form at the buffer cursor
            pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
                let header = FixedHeader::read(buffer)?;
                header.expect($packet_type, buffer)?;
                header.expect_flags($flags)?;

                let start = buffer.position();
                self.id.read(buffer)?;
                header.expect_consumed(buffer.position() - start)
            }

            /// Serialize the wire form onto the buffer
            pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
                let mut body = PacketBuffer::new();
                self.id.write(&mut body);
                write_packet(buffer, $packet_type, $flags, &body)
            }
        }
    };
}

identifier_packet!(
    /// PUBACK: QoS 1 publish acknowledgment.
    PubAckPacket,
    PacketType::PubAck,
    0b0000
);

identifier_packet!(
    /// PUBREC: first phase of the QoS 2 handshake ("publish received").
    PubRecPacket,
    PacketType::PubRec,
    0b0000
);

identifier_packet!(
    /// PUBREL: second phase of the QoS 2 handshake ("publish release").
    PubRelPacket,
    PacketType::PubRel,
    0b0010
);

identifier_packet!(
    /// PUBCOMP: final phase of the QoS 2 handshake ("publish complete").
    PubCompPacket,
    PacketType::PubComp,
    0b0000
);

identifier_packet!(
    /// UNSUBACK: unsubscribe acknowledgment.
    UnsubAckPacket,
    PacketType::UnsubAck,
    0b0000
);
