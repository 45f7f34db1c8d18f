//! Packets with no variable header and no payload.
//!
//! PINGREQ, PINGRESP and DISCONNECT are a bare fixed header with a remaining
//! length of zero.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError};
use crate::packet::{write_packet, FixedHeader, PacketType};

macro_rules! empty_packet {
    ($(#[$doc:meta])* $name:ident, $packet_type:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            /// Create the packet
            #[must_use]
            pub fn new() -> Self {
                Self
            }

            /// Parse the wire form at the buffer cursor
            pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
                let header = FixedHeader::read(buffer)?;
                header.expect($packet_type, buffer)?;
                header.expect_flags(0b0000)?;
                header.expect_consumed(0)
            }

            /// Serialize the wire form onto the buffer
            pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
                write_packet(buffer, $packet_type, 0b0000, &PacketBuffer::new())
            }
        }
    };
}

empty_packet!(
    /// PINGREQ: keepalive probe.
    PingReqPacket,
    PacketType::PingReq
);

empty_packet!(
    /// PINGRESP: keepalive response.
    PingRespPacket,
    PacketType::PingResp
);

empty_packet!(
    /// DISCONNECT: graceful shutdown notification.
    DisconnectPacket,
    PacketType::Disconnect
);
