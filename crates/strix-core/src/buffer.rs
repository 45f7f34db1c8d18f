//! Appendable byte cursor buffer underlying the packet codec.
//!
//! A [`PacketBuffer`] is an append-only backing store plus a read cursor.
//! Reads that run past the written length fail with
//! [`DecodeError::EndOfStream`], never with a malformed-packet error - the
//! distinction is what lets the stream parser suspend on a partial packet
//! and resume when more bytes arrive. All multi-byte fields are big-endian
//! (network byte order).

use crate::error::{DecodeError, EncodeError};
use crate::{MAX_REMAINING_LENGTH, MAX_STRING_LENGTH};

/// Growable byte buffer with a read cursor.
///
/// Grows by [`write`](Self::write), shrinks by [`cut`](Self::cut) after a
/// fully consumed packet. The cursor supports relative [`seek`](Self::seek)
/// and absolute save/restore via [`position`](Self::position) /
/// [`set_position`](Self::set_position) for speculative parses.
#[derive(Debug, Default, Clone)]
pub struct PacketBuffer {
    data: Vec<u8>,
    position: usize,
}

impl PacketBuffer {
    /// Create a new empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer pre-filled with the given bytes, cursor at zero
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
        }
    }

    /// Total number of bytes written to the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the buffer holds no bytes at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of unconsumed bytes at the cursor
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Current cursor position
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor to an absolute position.
    ///
    /// The position is clamped to the written length.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// Move the cursor relative to its current position.
    ///
    /// Negative offsets rewind; the result is clamped to the valid range.
    pub fn seek(&mut self, offset: i64) {
        let target = self.position as i64 + offset;
        self.position = target.clamp(0, self.data.len() as i64) as usize;
    }

    /// Discard all bytes before the cursor and rebase it to zero.
    ///
    /// Called after each fully consumed packet to bound memory growth.
    pub fn cut(&mut self) {
        self.data.drain(..self.position);
        self.position = 0;
    }

    /// The entire backing store, consumed and unconsumed
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Append raw bytes to the backing store
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a single byte
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Append a 16-bit big-endian word
    pub fn write_word(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a length-prefixed UTF-8 string.
    ///
    /// Fails when the encoded string exceeds the 16-bit length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_STRING_LENGTH {
            return Err(EncodeError::StringTooLong(bytes.len()));
        }
        self.write_word(bytes.len() as u16);
        self.write(bytes);
        Ok(())
    }

    /// Append a remaining-length field.
    ///
    /// Seven data bits per byte, least significant group first, the high bit
    /// flagging a continuation byte. At most four bytes; values above
    /// [`MAX_REMAINING_LENGTH`] fail.
    pub fn write_remaining_length(&mut self, mut value: usize) -> Result<(), EncodeError> {
        if value > MAX_REMAINING_LENGTH {
            return Err(EncodeError::RemainingLengthExceeded(value));
        }
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value > 0 {
                byte |= 0x80;
            }
            self.data.push(byte);
            if value == 0 {
                return Ok(());
            }
        }
    }

    /// Consume `count` bytes at the cursor
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if self.remaining() < count {
            return Err(DecodeError::EndOfStream);
        }
        let bytes = self.data[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(bytes)
    }

    /// Consume a single byte
    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        if self.remaining() < 1 {
            return Err(DecodeError::EndOfStream);
        }
        let byte = self.data[self.position];
        self.position += 1;
        Ok(byte)
    }

    /// Consume a 16-bit big-endian word
    pub fn read_word(&mut self) -> Result<u16, DecodeError> {
        if self.remaining() < 2 {
            return Err(DecodeError::EndOfStream);
        }
        let word = u16::from_be_bytes([self.data[self.position], self.data[self.position + 1]]);
        self.position += 2;
        Ok(word)
    }

    /// Consume a length-prefixed UTF-8 string.
    ///
    /// A declared length exceeding the buffered bytes is end-of-stream, not
    /// malformed; invalid UTF-8 is malformed.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let length = self.read_word()? as usize;
        match self.read(length) {
            Ok(bytes) => String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8),
            Err(err) => {
                self.position = start;
                Err(err)
            }
        }
    }

    /// Consume a remaining-length field.
    ///
    /// Running out of buffered bytes mid-sequence is end-of-stream; a fourth
    /// byte still carrying the continuation bit is malformed.
    pub fn read_remaining_length(&mut self) -> Result<usize, DecodeError> {
        let start = self.position;
        let mut value = 0usize;
        for group in 0..4 {
            let byte = match self.read_byte() {
                Ok(byte) => byte,
                Err(err) => {
                    self.position = start;
                    return Err(err);
                }
            };
            value |= usize::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.position = start;
        Err(DecodeError::RemainingLengthTooLong)
    }
}
