//! PUBLISH packet: the message-delivery request.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError, ValueError};
use crate::packet::{write_packet, FixedHeader, PacketId, PacketType, QoS};
use crate::MAX_STRING_LENGTH;

const DUPLICATE_FLAG: u8 = 0b1000;
const RETAIN_FLAG: u8 = 0b0001;

/// A PUBLISH packet.
///
/// The flag nibble carries duplicate (bit 3), QoS (bits 1-2) and retain
/// (bit 0). The packet identifier is present on the wire only when the QoS
/// level is greater than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPacket {
    id: PacketId,
    topic: String,
    payload: Vec<u8>,
    qos: QoS,
    duplicate: bool,
    retain: bool,
}

impl PublishPacket {
    /// Create an empty QoS 0 packet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The topic this message is published to
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Set the topic, rejecting empty or oversized values
    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), ValueError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ValueError::EmptyTopic);
        }
        if topic.len() > MAX_STRING_LENGTH {
            return Err(ValueError::TopicTooLong(topic.len()));
        }
        self.topic = topic;
        Ok(())
    }

    /// The opaque application payload
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Set the payload
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    /// Quality-of-service level
    #[must_use]
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Set the quality-of-service level
    pub fn set_qos(&mut self, qos: QoS) {
        self.qos = qos;
    }

    /// Whether this packet is a redelivery
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    /// Mark this packet as a redelivery
    pub fn set_duplicate(&mut self, duplicate: bool) {
        self.duplicate = duplicate;
    }

    /// Whether the broker should retain this message
    #[must_use]
    pub fn is_retained(&self) -> bool {
        self.retain
    }

    /// Set the retain flag
    pub fn set_retain(&mut self, retain: bool) {
        self.retain = retain;
    }

    /// The packet identifier, present only when QoS > 0
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        if self.qos == QoS::AtMostOnce {
            None
        } else {
            self.id.get()
        }
    }

    /// Assign the packet identifier, rejecting zero
    pub fn set_packet_id(&mut self, id: u16) -> Result<(), ValueError> {
        self.id.set(id)
    }

    /// Return the packet identifier, generating and caching one if
    /// unassigned. Flows call this before sending so acknowledgments can be
    /// matched.
    pub fn generate_packet_id(&mut self) -> u16 {
        self.id.get_or_generate()
    }

    fn flags(&self) -> u8 {
        let mut flags = self.qos.as_u8() << 1;
        if self.duplicate {
            flags |= DUPLICATE_FLAG;
        }
        if self.retain {
            flags |= RETAIN_FLAG;
        }
        flags
    }

    /// Parse the wire form at the buffer cursor
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let header = FixedHeader::read(buffer)?;
        header.expect(PacketType::Publish, buffer)?;

        self.duplicate = header.flags & DUPLICATE_FLAG != 0;
        self.retain = header.flags & RETAIN_FLAG != 0;
        self.qos = QoS::try_from((header.flags >> 1) & 0b11)?;

        let start = buffer.position();
        self.topic = buffer.read_string()?;
        if self.topic.is_empty() {
            return Err(DecodeError::EmptyTopic);
        }
        self.id = PacketId::default();
        if self.qos > QoS::AtMostOnce {
            self.id.read(buffer)?;
        }

        let consumed = buffer.position() - start;
        if consumed > header.remaining_length {
            return Err(DecodeError::LengthMismatch {
                declared: header.remaining_length,
                consumed,
            });
        }
        self.payload = buffer.read(header.remaining_length - consumed)?;
        Ok(())
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        body.write_string(&self.topic)?;
        if self.qos > QoS::AtMostOnce {
            self.id.write(&mut body);
        }
        body.write(&self.payload);

        write_packet(buffer, PacketType::Publish, self.flags(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(qos: QoS) -> PublishPacket {
        let mut packet = PublishPacket::new();
        packet.set_topic("sensors/kitchen/temp").unwrap();
        packet.set_payload(&b"21.5"[..]);
        packet.set_qos(qos);
        packet
    }

    #[test]
    fn test_roundtrip_qos0() {
        let mut original = sample(QoS::AtMostOnce);
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();

        let mut parsed = PublishPacket::new();
        parsed.read(&mut buffer).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.packet_id(), None);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_roundtrip_qos1_carries_id() {
        let mut original = sample(QoS::AtLeastOnce);
        original.set_packet_id(0x1234).unwrap();
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();

        let mut parsed = PublishPacket::new();
        parsed.read(&mut buffer).unwrap();
        assert_eq!(parsed.packet_id(), Some(0x1234));
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_write_generates_id_for_qos2() {
        let mut packet = sample(QoS::ExactlyOnce);
        assert_eq!(packet.packet_id(), None);
        let mut buffer = PacketBuffer::new();
        packet.write(&mut buffer).unwrap();
        let id = packet.packet_id().unwrap();
        assert_ne!(id, 0);

        // A second write reuses the cached identifier.
        let mut again = PacketBuffer::new();
        packet.write(&mut again).unwrap();
        assert_eq!(buffer.as_slice(), again.as_slice());
    }

    #[test]
    fn test_qos3_flags_malformed() {
        // type 3, flags 0b0110 = both QoS bits set
        let mut buffer = PacketBuffer::from_bytes(&[0x36, 0x05, 0x00, 0x03, b'a', b'/', b'b']);
        let mut packet = PublishPacket::new();
        assert_eq!(packet.read(&mut buffer), Err(DecodeError::InvalidQos(3)));
    }

    #[test]
    fn test_duplicate_and_retain_flags() {
        let mut original = sample(QoS::AtLeastOnce);
        original.set_duplicate(true);
        original.set_retain(true);
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        assert_eq!(buffer.as_slice()[0], 0x3B);

        let mut parsed = PublishPacket::new();
        parsed.read(&mut buffer).unwrap();
        assert!(parsed.is_duplicate());
        assert!(parsed.is_retained());
    }

    #[test]
    fn test_empty_topic_rejected_by_setter() {
        let mut packet = PublishPacket::new();
        assert_eq!(packet.set_topic(""), Err(ValueError::EmptyTopic));
    }

    #[test]
    fn test_empty_topic_on_wire_malformed() {
        // remaining length 2: a zero-length topic string, nothing else
        let mut buffer = PacketBuffer::from_bytes(&[0x30, 0x02, 0x00, 0x00]);
        let mut packet = PublishPacket::new();
        assert_eq!(packet.read(&mut buffer), Err(DecodeError::EmptyTopic));
    }

    #[test]
    fn test_declared_length_shorter_than_topic() {
        // remaining length 3 cannot hold the five-byte topic field
        let mut buffer =
            PacketBuffer::from_bytes(&[0x30, 0x03, 0x00, 0x03, b'a', b'b', b'c', 0xFF]);
        let mut packet = PublishPacket::new();
        assert_eq!(
            packet.read(&mut buffer),
            Err(DecodeError::LengthMismatch {
                declared: 3,
                consumed: 5
            })
        );
    }

    #[test]
    fn test_truncated_packet_is_end_of_stream() {
        let mut original = sample(QoS::AtMostOnce);
        let mut encoded = PacketBuffer::new();
        original.write(&mut encoded).unwrap();
        let bytes = encoded.as_slice();

        let mut buffer = PacketBuffer::from_bytes(&bytes[..bytes.len() - 2]);
        let mut packet = PublishPacket::new();
        assert_eq!(packet.read(&mut buffer), Err(DecodeError::EndOfStream));
    }
}
