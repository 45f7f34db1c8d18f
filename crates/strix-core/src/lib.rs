//! # Strix Core
//!
//! Core protocol engine for MQTT 3.1.1: a binary packet codec, an
//! incremental stream parser, and flow state machines for the multi-packet
//! request/acknowledgment exchanges.
//!
//! This crate provides:
//! - Packet encoding and decoding for all 14 control-packet types
//! - An appendable cursor buffer with the variable-length size codec
//! - A stream parser that frames packets out of arbitrary byte chunks
//! - Flow state machines (connect, ping, publish, subscribe exchanges)
//! - Error types and handling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Flows                                   │
//! │   (one state machine per in-flight protocol exchange)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      Stream Parser                               │
//! │   (arbitrary byte chunks in, complete packets out)              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                   Packets / PacketBuffer                         │
//! │   (fixed header + remaining length + variable header codec)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is sans-IO and single-threaded: nothing here blocks or touches
//! a socket. The transport layer feeds bytes into [`StreamParser::push`] and
//! writes the bytes produced by packet [`write`](packet::Packet::write)
//! calls; a connection manager routes parsed packets to pending flows by
//! packet identifier.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod error;
pub mod factory;
pub mod flow;
pub mod packet;
pub mod parser;

pub use buffer::PacketBuffer;
pub use error::{DecodeError, EncodeError, Error, ValueError};
pub use factory::{DefaultPacketFactory, PacketFactory};
pub use flow::{Flow, FlowState};
pub use packet::{Packet, PacketType, QoS};
pub use parser::StreamParser;

/// Maximum value representable by the variable-length remaining-length field
/// (four bytes of seven data bits each).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum byte length of a length-prefixed UTF-8 string.
pub const MAX_STRING_LENGTH: usize = 65_535;

/// Protocol name carried in the CONNECT variable header.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;
