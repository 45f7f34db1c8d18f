//! Incremental stream parser: arbitrary byte chunks in, packets out.
//!
//! A network transport delivers bytes at whatever chunk boundaries it
//! pleases - half a packet, three packets and a fragment, one byte at a
//! time. [`StreamParser::push`] buffers whatever arrives and slices out as
//! many complete packets as are currently available; incomplete trailing
//! bytes stay buffered for the next call.

use crate::buffer::PacketBuffer;
use crate::error::DecodeError;
use crate::factory::{DefaultPacketFactory, PacketFactory};
use crate::packet::Packet;
use tracing::{trace, warn};

/// Callback invoked synchronously for every unrecognized-type or
/// malformed-packet error. Must not panic.
pub type ErrorCallback = Box<dyn FnMut(&DecodeError) + Send>;

/// Parses a stream of bytes into discrete packets.
///
/// # Error recovery
///
/// Unknown packet types cannot be skipped by length (their remaining-length
/// field cannot be trusted), so after reporting the error the parser
/// advances one byte and resumes scanning; the same applies after a
/// malformed packet, where the cursor is reset to one byte past the failed
/// packet's start. This guarantees forward progress - the same prefix is
/// never re-parsed - at the cost of possibly misinterpreting bytes inside a
/// damaged packet as a new fixed header. Callers that need a hard guarantee
/// should drop the connection on the first reported error.
pub struct StreamParser {
    buffer: PacketBuffer,
    factory: Box<dyn PacketFactory + Send>,
    error_callback: Option<ErrorCallback>,
}

impl StreamParser {
    /// Create a parser backed by the standard packet factory
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Box::new(DefaultPacketFactory))
    }

    /// Create a parser backed by a custom packet factory
    #[must_use]
    pub fn with_factory(factory: Box<dyn PacketFactory + Send>) -> Self {
        Self {
            buffer: PacketBuffer::new(),
            factory,
            error_callback: None,
        }
    }

    /// Register the error callback.
    ///
    /// Invoked synchronously from [`push`](Self::push) for every
    /// unrecognized-type or malformed-packet error. The callback must not
    /// panic; a panicking callback is a bug in the caller.
    pub fn on_error(&mut self, callback: impl FnMut(&DecodeError) + Send + 'static) {
        self.error_callback = Some(Box::new(callback));
    }

    /// Number of bytes buffered awaiting the rest of a packet
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.remaining()
    }

    /// Append a chunk of bytes and parse out every complete packet.
    ///
    /// Returns the fully parsed packets in arrival order, possibly none. A
    /// partial packet at the tail of the buffer is kept for a future call.
    pub fn push(&mut self, data: &[u8]) -> Vec<Packet> {
        self.buffer.write(data);

        let mut result = Vec::new();
        while self.buffer.remaining() > 0 {
            let Ok(first) = self.buffer.read_byte() else {
                break;
            };

            let mut packet = match self.factory.build(first >> 4) {
                Ok(packet) => packet,
                Err(err) => {
                    // The unknown type byte stays consumed: one byte of
                    // forward progress.
                    self.report(&err);
                    self.buffer.cut();
                    continue;
                }
            };

            self.buffer.seek(-1);
            let start = self.buffer.position();
            match packet.read(&mut self.buffer) {
                Ok(()) => {
                    trace!(packet_type = ?packet.packet_type(), "parsed packet");
                    result.push(packet);
                    self.buffer.cut();
                }
                Err(DecodeError::EndOfStream) => {
                    self.buffer.set_position(start);
                    break;
                }
                Err(err) => {
                    self.report(&err);
                    self.buffer.set_position(start + 1);
                    self.buffer.cut();
                }
            }
        }

        result
    }

    fn report(&mut self, err: &DecodeError) {
        warn!(error = %err, "discarding unparseable bytes");
        if let Some(callback) = &mut self.error_callback {
            callback(err);
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketType, PubAckPacket, PublishPacket, QoS};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn publish_bytes(topic: &str, payload: &[u8], qos: QoS) -> Vec<u8> {
        let mut packet = PublishPacket::new();
        packet.set_topic(topic).unwrap();
        packet.set_payload(payload);
        packet.set_qos(qos);
        if qos > QoS::AtMostOnce {
            packet.set_packet_id(0x2040).unwrap();
        }
        let mut buffer = PacketBuffer::new();
        packet.write(&mut buffer).unwrap();
        buffer.as_slice().to_vec()
    }

    #[test]
    fn test_single_packet() {
        let mut parser = StreamParser::new();
        let packets = parser.push(&publish_bytes("a/b", b"x", QoS::AtMostOnce));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type(), PacketType::Publish);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_partial_delivery() {
        let bytes = publish_bytes("a/b", b"payload", QoS::AtLeastOnce);
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        let mut parser = StreamParser::new();
        assert!(parser.push(head).is_empty());
        assert_eq!(parser.buffered(), head.len());

        let packets = parser.push(tail);
        assert_eq!(packets.len(), 1);
        match &packets[0] {
            Packet::Publish(publish) => {
                assert_eq!(publish.topic(), "a/b");
                assert_eq!(publish.payload(), b"payload");
                assert_eq!(publish.packet_id(), Some(0x2040));
            }
            other => panic!("expected a publish packet, got {other:?}"),
        }
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = publish_bytes("a/b", b"drip", QoS::AtMostOnce);
        let mut parser = StreamParser::new();
        let mut packets = Vec::new();
        for byte in &bytes {
            packets.extend(parser.push(std::slice::from_ref(byte)));
        }
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn test_multi_packet_batch() {
        let mut batch = publish_bytes("first", b"1", QoS::AtMostOnce);
        batch.extend(publish_bytes("second", b"2", QoS::AtMostOnce));
        let mut puback = PubAckPacket::with_packet_id(9).unwrap();
        let mut buffer = PacketBuffer::new();
        puback.write(&mut buffer).unwrap();
        batch.extend(buffer.as_slice());

        let mut parser = StreamParser::new();
        let packets = parser.push(&batch);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].packet_type(), PacketType::Publish);
        assert_eq!(packets[1].packet_type(), PacketType::Publish);
        assert_eq!(packets[2].packet_type(), PacketType::PubAck);
    }

    #[test]
    fn test_unknown_type_reported_and_skipped() {
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);

        let mut parser = StreamParser::new();
        parser.on_error(move |err| {
            assert_eq!(*err, DecodeError::UnknownPacketType(0));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(parser.push(&[0x00]).is_empty());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_malformed_then_valid_packet_resyncs() {
        // A PUBACK with a zero identifier, then a valid PUBACK. The parser
        // reports the malformed packet and still finds the valid one.
        let mut bytes = vec![0x40, 0x02, 0x00, 0x00];
        let mut puback = PubAckPacket::with_packet_id(5).unwrap();
        let mut buffer = PacketBuffer::new();
        puback.write(&mut buffer).unwrap();
        bytes.extend(buffer.as_slice());

        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        let mut parser = StreamParser::new();
        parser.on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let packets = parser.push(&bytes);
        assert!(errors.load(Ordering::SeqCst) >= 1);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_id(), Some(5));
    }

    #[test]
    fn test_push_always_terminates_on_garbage() {
        let mut parser = StreamParser::new();
        let garbage = [0x37u8; 64]; // publish-typed bytes with QoS 3 flags
        let packets = parser.push(&garbage);
        assert!(packets.is_empty());
    }

    #[test]
    fn test_error_recovery_compacts_backing_store() {
        // A peer streaming nothing but garbage must not grow the backing
        // store: discarded bytes are compacted away, not just skipped.
        let mut parser = StreamParser::new();
        for _ in 0..100 {
            assert!(parser.push(&[0x00; 1024]).is_empty());
            assert!(parser.buffer.len() <= 1024);
        }
        assert_eq!(parser.buffer.len(), 0);

        // Same for the malformed-packet path: zero-identifier PUBACKs.
        let mut parser = StreamParser::new();
        for _ in 0..100 {
            assert!(parser.push(&[0x40, 0x02, 0x00, 0x00]).is_empty());
            assert!(parser.buffer.len() <= 4);
        }
        assert_eq!(parser.buffer.len(), 0);
    }

    #[test]
    fn test_order_matches_arrival_order() {
        let mut batch = Vec::new();
        for topic in ["one", "two", "three"] {
            batch.extend(publish_bytes(topic, b"", QoS::AtMostOnce));
        }
        let mut parser = StreamParser::new();
        let topics: Vec<String> = parser
            .push(&batch)
            .into_iter()
            .map(|packet| match packet {
                Packet::Publish(publish) => publish.topic().to_string(),
                other => panic!("expected a publish packet, got {other:?}"),
            })
            .collect();
        assert_eq!(topics, ["one", "two", "three"]);
    }
}
