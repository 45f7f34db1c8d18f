//! Connection establishment packets: CONNECT and CONNACK.

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, EncodeError, ValueError};
use crate::packet::{write_packet, FixedHeader, PacketType, QoS};
use crate::{MAX_STRING_LENGTH, PROTOCOL_LEVEL, PROTOCOL_NAME};
use std::fmt;

const USERNAME_FLAG: u8 = 0b1000_0000;
const PASSWORD_FLAG: u8 = 0b0100_0000;
const WILL_RETAIN_FLAG: u8 = 0b0010_0000;
const WILL_FLAG: u8 = 0b0000_0100;
const CLEAN_SESSION_FLAG: u8 = 0b0000_0010;
const RESERVED_FLAG: u8 = 0b0000_0001;

/// Last-will message registered at connect time and published by the broker
/// if the client vanishes without a DISCONNECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Will {
    /// Topic the will message is published to
    pub topic: String,
    /// Will message body
    pub message: Vec<u8>,
    /// QoS level for the will publish
    pub qos: QoS,
    /// Whether the broker retains the will message
    pub retain: bool,
}

/// A CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    client_id: String,
    clean_session: bool,
    keep_alive: u16,
    will: Option<Will>,
    username: Option<String>,
    password: Option<Vec<u8>>,
}

impl Default for ConnectPacket {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            clean_session: true,
            keep_alive: 60,
            will: None,
            username: None,
            password: None,
        }
    }
}

impl ConnectPacket {
    /// Create a clean-session connect request for the given client id
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// The client identifier
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Set the client identifier
    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.client_id = client_id.into();
    }

    /// Whether the broker should discard previous session state
    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Set the clean-session flag
    pub fn set_clean_session(&mut self, clean_session: bool) {
        self.clean_session = clean_session;
    }

    /// Keepalive interval in seconds
    #[must_use]
    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// Set the keepalive interval in seconds
    pub fn set_keep_alive(&mut self, keep_alive: u16) {
        self.keep_alive = keep_alive;
    }

    /// The registered last-will message, if any
    #[must_use]
    pub fn will(&self) -> Option<&Will> {
        self.will.as_ref()
    }

    /// Register a last-will message, rejecting an empty will topic
    pub fn set_will(&mut self, will: Will) -> Result<(), ValueError> {
        if will.topic.is_empty() {
            return Err(ValueError::EmptyTopic);
        }
        if will.topic.len() > MAX_STRING_LENGTH {
            return Err(ValueError::TopicTooLong(will.topic.len()));
        }
        self.will = Some(will);
        Ok(())
    }

    /// Drop the registered last-will message
    pub fn clear_will(&mut self) {
        self.will = None;
    }

    /// The username credential, if any
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Set the username credential
    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    /// The password credential, if any
    #[must_use]
    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }

    /// Set the password credential
    pub fn set_password(&mut self, password: Option<Vec<u8>>) {
        self.password = password;
    }

    fn connect_flags(&self) -> u8 {
        let mut flags = 0;
        if self.username.is_some() {
            flags |= USERNAME_FLAG;
        }
        if self.password.is_some() {
            flags |= PASSWORD_FLAG;
        }
        if let Some(will) = &self.will {
            flags |= WILL_FLAG;
            flags |= will.qos.as_u8() << 3;
            if will.retain {
                flags |= WILL_RETAIN_FLAG;
            }
        }
        if self.clean_session {
            flags |= CLEAN_SESSION_FLAG;
        }
        flags
    }

    /// Parse the wire form at the buffer cursor
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let header = FixedHeader::read(buffer)?;
        header.expect(PacketType::Connect, buffer)?;
        header.expect_flags(0b0000)?;

        let start = buffer.position();
        let protocol_name = buffer.read_string()?;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName(protocol_name));
        }
        let level = buffer.read_byte()?;
        if level != PROTOCOL_LEVEL {
            return Err(DecodeError::UnsupportedProtocolLevel(level));
        }

        let flags = buffer.read_byte()?;
        if flags & RESERVED_FLAG != 0 {
            return Err(DecodeError::ReservedConnectFlag);
        }
        let will_qos = QoS::try_from((flags >> 3) & 0b11)?;
        let will_retain = flags & WILL_RETAIN_FLAG != 0;
        let has_will = flags & WILL_FLAG != 0;
        if !has_will && (will_qos != QoS::AtMostOnce || will_retain) {
            return Err(DecodeError::InvalidWillFlags);
        }
        self.clean_session = flags & CLEAN_SESSION_FLAG != 0;

        self.keep_alive = buffer.read_word()?;
        self.client_id = buffer.read_string()?;

        self.will = if has_will {
            let topic = buffer.read_string()?;
            if topic.is_empty() {
                return Err(DecodeError::EmptyTopic);
            }
            let message_length = buffer.read_word()? as usize;
            let message = buffer.read(message_length)?;
            Some(Will {
                topic,
                message,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        self.username = if flags & USERNAME_FLAG != 0 {
            Some(buffer.read_string()?)
        } else {
            None
        };
        self.password = if flags & PASSWORD_FLAG != 0 {
            let length = buffer.read_word()? as usize;
            Some(buffer.read(length)?)
        } else {
            None
        };

        header.expect_consumed(buffer.position() - start)
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        body.write_string(PROTOCOL_NAME)?;
        body.write_byte(PROTOCOL_LEVEL);
        body.write_byte(self.connect_flags());
        body.write_word(self.keep_alive);
        body.write_string(&self.client_id)?;
        if let Some(will) = &self.will {
            body.write_string(&will.topic)?;
            if will.message.len() > MAX_STRING_LENGTH {
                return Err(EncodeError::StringTooLong(will.message.len()));
            }
            body.write_word(will.message.len() as u16);
            body.write(&will.message);
        }
        if let Some(username) = &self.username {
            body.write_string(username)?;
        }
        if let Some(password) = &self.password {
            if password.len() > MAX_STRING_LENGTH {
                return Err(EncodeError::StringTooLong(password.len()));
            }
            body.write_word(password.len() as u16);
            body.write(password);
        }
        write_packet(buffer, PacketType::Connect, 0b0000, &body)
    }
}

/// CONNACK return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    /// Connection accepted
    Accepted = 0,
    /// Broker does not speak the requested protocol level
    UnacceptableProtocolVersion = 1,
    /// Client identifier rejected
    IdentifierRejected = 2,
    /// Broker unavailable
    ServerUnavailable = 3,
    /// Malformed username or password
    BadUsernameOrPassword = 4,
    /// Client not authorized to connect
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    /// Whether the connection was accepted
    #[must_use]
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Accepted => "connection accepted",
            Self::UnacceptableProtocolVersion => "unacceptable protocol version",
            Self::IdentifierRejected => "identifier rejected",
            Self::ServerUnavailable => "server unavailable",
            Self::BadUsernameOrPassword => "bad user name or password",
            Self::NotAuthorized => "not authorized",
        };
        f.write_str(message)
    }
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::UnacceptableProtocolVersion),
            2 => Ok(Self::IdentifierRejected),
            3 => Ok(Self::ServerUnavailable),
            4 => Ok(Self::BadUsernameOrPassword),
            5 => Ok(Self::NotAuthorized),
            _ => Err(DecodeError::InvalidReturnCode(value)),
        }
    }
}

/// A CONNACK packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnAckPacket {
    session_present: bool,
    return_code: ConnectReturnCode,
}

impl Default for ConnAckPacket {
    fn default() -> Self {
        Self {
            session_present: false,
            return_code: ConnectReturnCode::Accepted,
        }
    }
}

impl ConnAckPacket {
    /// Create an acknowledgment with the given return code
    #[must_use]
    pub fn new(return_code: ConnectReturnCode, session_present: bool) -> Self {
        Self {
            session_present,
            return_code,
        }
    }

    /// Whether the broker restored session state from a previous connection
    #[must_use]
    pub fn session_present(&self) -> bool {
        self.session_present
    }

    /// The connection return code
    #[must_use]
    pub fn return_code(&self) -> ConnectReturnCode {
        self.return_code
    }

    /// Parse the wire form at the buffer cursor
    pub fn read(&mut self, buffer: &mut PacketBuffer) -> Result<(), DecodeError> {
        let header = FixedHeader::read(buffer)?;
        header.expect(PacketType::ConnAck, buffer)?;
        header.expect_flags(0b0000)?;

        let start = buffer.position();
        let acknowledge_flags = buffer.read_byte()?;
        if acknowledge_flags & !0x01 != 0 {
            return Err(DecodeError::InvalidAcknowledgeFlags(acknowledge_flags));
        }
        self.session_present = acknowledge_flags == 0x01;
        self.return_code = ConnectReturnCode::try_from(buffer.read_byte()?)?;
        header.expect_consumed(buffer.position() - start)
    }

    /// Serialize the wire form onto the buffer
    pub fn write(&mut self, buffer: &mut PacketBuffer) -> Result<(), EncodeError> {
        let mut body = PacketBuffer::new();
        body.write_byte(u8::from(self.session_present));
        body.write_byte(self.return_code as u8);
        write_packet(buffer, PacketType::ConnAck, 0b0000, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_connect_roundtrip() {
        let mut original = ConnectPacket::new("strix-client");
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();

        let mut parsed = ConnectPacket::default();
        parsed.read(&mut buffer).unwrap();
        assert_eq!(parsed, original);
        assert!(parsed.clean_session());
        assert_eq!(parsed.keep_alive(), 60);
    }

    #[test]
    fn test_full_connect_roundtrip() {
        let mut original = ConnectPacket::new("strix-client");
        original.set_clean_session(false);
        original.set_keep_alive(30);
        original
            .set_will(Will {
                topic: "status/strix-client".into(),
                message: b"offline".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: true,
            })
            .unwrap();
        original.set_username(Some("user".into()));
        original.set_password(Some(b"secret".to_vec()));

        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();

        let mut parsed = ConnectPacket::default();
        parsed.read(&mut buffer).unwrap();
        assert_eq!(parsed, original);
        let will = parsed.will().unwrap();
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn test_wrong_protocol_name() {
        let mut original = ConnectPacket::new("c");
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes[6] = b'X'; // corrupt "MQTT"

        let mut parsed = ConnectPacket::default();
        let mut buffer = PacketBuffer::from_bytes(&bytes);
        assert_eq!(
            parsed.read(&mut buffer),
            Err(DecodeError::InvalidProtocolName("MQXT".into()))
        );
    }

    #[test]
    fn test_wrong_protocol_level() {
        let mut original = ConnectPacket::new("c");
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes[8] = 3;

        let mut parsed = ConnectPacket::default();
        let mut buffer = PacketBuffer::from_bytes(&bytes);
        assert_eq!(
            parsed.read(&mut buffer),
            Err(DecodeError::UnsupportedProtocolLevel(3))
        );
    }

    #[test]
    fn test_reserved_connect_flag() {
        let mut original = ConnectPacket::new("c");
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes[9] |= 0x01;

        let mut parsed = ConnectPacket::default();
        let mut buffer = PacketBuffer::from_bytes(&bytes);
        assert_eq!(
            parsed.read(&mut buffer),
            Err(DecodeError::ReservedConnectFlag)
        );
    }

    #[test]
    fn test_will_bits_without_will_flag() {
        let mut original = ConnectPacket::new("c");
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes[9] |= 0b0010_0000; // will-retain without the will flag

        let mut parsed = ConnectPacket::default();
        let mut buffer = PacketBuffer::from_bytes(&bytes);
        assert_eq!(parsed.read(&mut buffer), Err(DecodeError::InvalidWillFlags));
    }

    #[test]
    fn test_connack_roundtrip() {
        let mut original = ConnAckPacket::new(ConnectReturnCode::Accepted, true);
        let mut buffer = PacketBuffer::new();
        original.write(&mut buffer).unwrap();
        assert_eq!(buffer.as_slice(), &[0x20, 0x02, 0x01, 0x00]);

        let mut parsed = ConnAckPacket::default();
        parsed.read(&mut buffer).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_connack_invalid_return_code() {
        let mut buffer = PacketBuffer::from_bytes(&[0x20, 0x02, 0x00, 0x06]);
        let mut parsed = ConnAckPacket::default();
        assert_eq!(
            parsed.read(&mut buffer),
            Err(DecodeError::InvalidReturnCode(6))
        );
    }

    #[test]
    fn test_connack_invalid_acknowledge_flags() {
        let mut buffer = PacketBuffer::from_bytes(&[0x20, 0x02, 0x02, 0x00]);
        let mut parsed = ConnAckPacket::default();
        assert_eq!(
            parsed.read(&mut buffer),
            Err(DecodeError::InvalidAcknowledgeFlags(2))
        );
    }
}
