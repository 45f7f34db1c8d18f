//! Subscription management packets: SUBSCRIBE, SUBACK, UNSUBSCRIBE.
//!
//! SUBSCRIBE and UNSUBSCRIBE mandate a flag nibble of `0b0010`; anything
//! else is malformed. One topic filter per packet.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError, ValueError};
use crate::packet::{write_packet, FixedHeader, PacketId, PacketType, QoS};
use crate::MAX_STRING_LENGTH;

const SUBSCRIBE_FLAGS: u8 = 0b0010;

fn validate_topic(topic: &str) -> Result<(), ValueError> {
    if topic.is_empty() {
        return Err(ValueError::EmptyTopic);
    }
    if topic.len() > MAX_STRING_LENGTH {
        return Err(ValueError::TopicTooLong(topic.len()));
    }
    Ok(())
}

/// A SUBSCRIBE packet: one topic filter and its requested QoS level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribePacket {
    id: PacketId,
    topic: String,
    qos: QoS,
}

impl SubscribePacket {
    /// Create a subscription request for the given topic filter
    pub fn new(topic: impl Into<String>, qos: QoS) -> Result<Self, ValueError> {
        let topic = topic.into();
        validate_topic(&topic)?;
        Ok(Self {
            id: PacketId::default(),
            topic,
            qos,
        })
    }

    /// The topic filter
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Set the topic filter, rejecting empty or oversized values
    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), ValueError> {
        let topic = topic.into();
        validate_topic(&topic)?;
        self.topic = topic;
        Ok(())
    }

    /// The requested quality-of-service level
    #[must_use]
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Set the requested quality-of-service level
    pub fn set_qos(&mut self, qos: QoS) {
        self.qos = qos;
    }

    /// The packet identifier
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        self.id.get()
    }

    /// Assign the packet identifier, rejecting zero
    pub fn set_packet_id(&mut self, id: u16) -> Result<(), ValueError> {
        self.id.set(id)
    }

    /// Return the packet identifier, generating and caching one if
    /// unassigned
    pub fn generate_packet_id(&mut self) -> u16 {
        self.id.get_or_generate()
    }

    /// Parse the wire form at the buffer cursor
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let header = FixedHeader::read(buffer)?;
        header.expect(PacketType::Subscribe, buffer)?;
        header.expect_flags(SUBSCRIBE_FLAGS)?;

        let start = buffer.position();
        self.id.read(buffer)?;
        self.topic = buffer.read_string()?;
        if self.topic.is_empty() {
            return Err(DecodeError::EmptyTopic);
        }
        self.qos = QoS::try_from(buffer.read_byte()?)?;
        header.expect_consumed(buffer.position() - start)
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        self.id.write(&mut body);
        body.write_string(&self.topic)?;
        body.write_byte(self.qos.as_u8());
        write_packet(buffer, PacketType::Subscribe, SUBSCRIBE_FLAGS, &body)
    }
}

/// One SUBACK return code: the granted QoS level, or a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubackCode {
    /// Subscription granted at the given maximum QoS level
    Granted(QoS),
    /// Subscription rejected by the broker
    Failure,
}

impl SubackCode {
    /// Wire value of this code
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Granted(qos) => qos.as_u8(),
            Self::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubackCode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 | 1 | 2 => Ok(Self::Granted(QoS::try_from(value)?)),
            0x80 => Ok(Self::Failure),
            _ => Err(DecodeError::InvalidSubackCode(value)),
        }
    }
}

/// A SUBACK packet: the broker's response to a subscription request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubAckPacket {
    id: PacketId,
    codes: Vec<SubackCode>,
}

impl SubAckPacket {
    /// Create an acknowledgment for the given identifier and return codes
    pub fn new(id: u16, codes: Vec<SubackCode>) -> Result<Self, ValueError> {
        let mut packet = Self {
            id: PacketId::default(),
            codes,
        };
        packet.id.set(id)?;
        Ok(packet)
    }

    /// The return codes, one per requested topic filter
    #[must_use]
    pub fn codes(&self) -> &[SubackCode] {
        &self.codes
    }

    /// The packet identifier
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
        header.expect(PacketType::SubAck, buffer)?;
        header.expect_flags(0b0000)?;

        let start = buffer.position();
        self.id.read(buffer)?;
        let consumed = buffer.position() - start;
        if header.remaining_length < consumed {
            return Err(DecodeError::LengthMismatch {
                declared: header.remaining_length,
                consumed,
            });
        }
        if header.remaining_length == consumed {
            return Err(DecodeError::EmptySubackCodes);
        }
        self.codes.clear();
        for byte in buffer.read(header.remaining_length - consumed)? {
            self.codes.push(SubackCode::try_from(byte)?);
        }
        Ok(())
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        self.id.write(&mut body);
        for code in &self.codes {
            body.write_byte(code.as_u8());
        }
        write_packet(buffer, PacketType::SubAck, 0b0000, &body)
    }
}

/// An UNSUBSCRIBE packet: one topic filter to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribePacket {
    id: PacketId,
    topic: String,
}

impl UnsubscribePacket {
    /// Create an unsubscribe request for the given topic filter
    pub fn new(topic: impl Into<String>) -> Result<Self, ValueError> {
        let topic = topic.into();
        validate_topic(&topic)?;
        Ok(Self {
            id: PacketId::default(),
            topic,
        })
    }

    /// The topic filter
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Set the topic filter, rejecting empty or oversized values
    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), ValueError> {
        let topic = topic.into();
        validate_topic(&topic)?;
        self.topic = topic;
        Ok(())
    }

    /// The packet identifier
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        self.id.get()
    }

    /// Assign the packet identifier, rejecting zero
    pub fn set_packet_id(&mut self, id: u16) -> Result<(), ValueError> {
        self.id.set(id)
    }

    /// Return the packet identifier, generating and caching one if
    /// unassigned
    pub fn generate_packet_id(&mut self) -> u16 {
        self.id.get_or_generate()
    }

    /// Parse the wire form at the buffer cursor
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let header = FixedHeader::read(buffer)?;
        header.expect(PacketType::Unsubscribe, buffer)?;
        header.expect_flags(SUBSCRIBE_FLAGS)?;

        let start = buffer.position();
        self.id.read(buffer)?;
        self.topic = buffer.read_string()?;
        if self.topic.is_empty() {
            return Err(DecodeError::EmptyTopic);
        }
        header.expect_consumed(buffer.position() - start)
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        self.id.write(&mut body);
        body.write_string(&self.topic)?;
        write_packet(buffer, PacketType::Unsubscribe, SUBSCRIBE_FLAGS, &body)
    }
}
