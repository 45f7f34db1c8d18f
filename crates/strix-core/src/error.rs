//! Error types for the Strix protocol engine.
//!
//! Three distinct domains, kept apart on purpose: [`DecodeError`] covers
//! untrusted bytes arriving from the wire, [`EncodeError`] covers
//! serialization of locally built packets, and [`ValueError`] covers caller
//! misuse of packet setters before any wire interaction.

use crate::packet::PacketType;
use thiserror::Error;

/// Top-level engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Packet decoding error
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Packet encoding error
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Invalid argument passed to a packet setter
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),
}

/// Errors raised while decoding packets from untrusted bytes.
///
/// [`EndOfStream`](DecodeError::EndOfStream) is recoverable: the buffered
/// bytes do not yet contain a complete packet and more input may arrive.
/// Every other variant means the bytes are structurally invalid for the
/// claimed packet type and cannot become valid with more data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not enough buffered bytes to complete the read
    #[error("end of stream")]
    EndOfStream,

    /// Type discriminant not recognized by the packet factory
    #[error("unknown packet type: 0x{0:X}")]
    UnknownPacketType(u8),

    /// Fixed-header flags do not match the pattern the type requires
    #[error("invalid flags 0b{flags:04b} for {packet_type:?} packet")]
    InvalidFlags {
        /// Packet type being decoded
        packet_type: PacketType,
        /// Flag nibble found on the wire
        flags: u8,
    },

    /// Wrong packet type for this variant's `read`
    #[error("unexpected packet type {actual:?}, expected {expected:?}")]
    UnexpectedPacketType {
        /// Type the caller asked to decode
        expected: PacketType,
        /// Type found on the wire
        actual: PacketType,
    },

    /// Quality-of-service value 3 (both bits set) or larger
    #[error("invalid quality of service level: {0}")]
    InvalidQos(u8),

    /// Remaining-length field with a continuation bit on its fourth byte
    #[error("remaining length exceeds four bytes")]
    RemainingLengthTooLong,

    /// Variable header and payload did not consume exactly the declared
    /// remaining length
    #[error("declared remaining length {declared} but consumed {consumed}")]
    LengthMismatch {
        /// Remaining length from the fixed header
        declared: usize,
        /// Bytes actually consumed past the fixed header
        consumed: usize,
    },

    /// Length-prefixed string is not valid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// Packet identifier of zero on the wire
    #[error("packet identifier must not be zero")]
    ZeroPacketId,

    /// Empty topic on a packet that requires one
    #[error("topic must not be empty")]
    EmptyTopic,

    /// CONNECT carried a protocol name other than "MQTT"
    #[error("invalid protocol name: {0:?}")]
    InvalidProtocolName(String),

    /// CONNECT carried an unsupported protocol level
    #[error("unsupported protocol level: {0}")]
    UnsupportedProtocolLevel(u8),

    /// Reserved bit of the CONNECT flags byte was set
    #[error("reserved connect flag bit set")]
    ReservedConnectFlag,

    /// Will QoS or will-retain set without the will flag
    #[error("will flags set without will flag")]
    InvalidWillFlags,

    /// CONNACK return code outside the defined range
    #[error("invalid connect return code: {0}")]
    InvalidReturnCode(u8),

    /// CONNACK acknowledge-flags byte with reserved bits set
    #[error("invalid acknowledge flags: 0x{0:02X}")]
    InvalidAcknowledgeFlags(u8),

    /// SUBACK return code outside {0, 1, 2, 0x80}
    #[error("invalid subscribe return code: 0x{0:02X}")]
    InvalidSubackCode(u8),

    /// SUBACK with an empty return-code list
    #[error("subscribe acknowledgment carries no return codes")]
    EmptySubackCodes,
}

impl DecodeError {
    /// Indicates whether this error means "wait for more input" rather than
    /// "the bytes are corrupt".
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Errors raised while serializing a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// String exceeds the 16-bit length prefix
    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    /// Remaining length exceeds the four-byte variable-length encoding
    #[error("remaining length {0} exceeds the maximum encodable value")]
    RemainingLengthExceeded(usize),
}

/// Argument errors from packet setters, raised at the call site before any
/// wire interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Empty topic string
    #[error("the topic must not be empty")]
    EmptyTopic,

    /// Topic string exceeds the 16-bit length prefix
    #[error("topic of {0} bytes exceeds the 65535 byte limit")]
    TopicTooLong(usize),

    /// Quality-of-service level outside 0..=2
    #[error("quality of service level must be 0, 1 or 2, got {0}")]
    InvalidQos(u8),

    /// Packet identifier of zero
    #[error("the packet identifier must not be zero")]
    ZeroPacketId,
}
