//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! PostgreSQL uses big-endian (network byte order) for all integers.

use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16, I32, U16, U32};

use crate::error::{Error, Result};

/// Cursor over a message payload.
///
/// Every accessor consumes bytes from the front and fails with a protocol
/// error on underrun, so parsers can be written as straight-line `?` chains.
pub struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Wrap a payload slice.
    pub fn new(payload: &'a [u8]) -> Self {
        Self { rest: payload }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.rest
    }

    /// True when the payload is exhausted.
    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.rest.len() < len {
            return Err(Error::Protocol(format!(
                "{what}: need {len} bytes, {} left",
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    /// Read a 1-byte unsigned integer.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    /// Read a 2-byte big-endian signed integer.
    pub fn i16(&mut self) -> Result<i16> {
        let raw = self.take(2, "i16")?;
        let value = I16::ref_from_bytes(raw)
            .map_err(|e| Error::Protocol(format!("i16: {e:?}")))?;
        Ok(value.get())
    }

    /// Read a 2-byte big-endian unsigned integer.
    pub fn u16(&mut self) -> Result<u16> {
        let raw = self.take(2, "u16")?;
        let value = U16::ref_from_bytes(raw)
            .map_err(|e| Error::Protocol(format!("u16: {e:?}")))?;
        Ok(value.get())
    }

    /// Read a 4-byte big-endian signed integer.
    pub fn i32(&mut self) -> Result<i32> {
        let raw = self.take(4, "i32")?;
        let value = I32::ref_from_bytes(raw)
            .map_err(|e| Error::Protocol(format!("i32: {e:?}")))?;
        Ok(value.get())
    }

    /// Read a 4-byte big-endian unsigned integer.
    pub fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4, "u32")?;
        let value = U32::ref_from_bytes(raw)
            .map_err(|e| Error::Protocol(format!("u32: {e:?}")))?;
        Ok(value.get())
    }

    /// Read a fixed number of raw bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len, "bytes")
    }

    /// Read a null-terminated string (PostgreSQL String type).
    pub fn cstr(&mut self) -> Result<&'a str> {
        let pos = memchr::memchr(0, self.rest)
            .ok_or_else(|| Error::Protocol("cstr: no null terminator found".into()))?;
        let raw = &self.rest[..pos];
        self.rest = &self.rest[pos + 1..];
        simdutf8::compat::from_utf8(raw)
            .map_err(|e| Error::Protocol(format!("cstr: invalid UTF-8: {e}")))
    }
}

/// Message builder that handles the length field.
///
/// PostgreSQL message format:
/// - Type byte (1 byte) - NOT included in length
/// - Length (4 bytes) - includes itself
/// - Payload (Length - 4 bytes)
///
/// The builder pushes the type byte, reserves the length field, and
/// backpatches it on [`finish`][MessageBuilder::finish].
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Start building a message with a type byte.
    pub fn new(buf: &'a mut Vec<u8>, type_byte: u8) -> Self {
        buf.push(type_byte);
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        Self { buf, start }
    }

    /// Start building a startup-phase message (no type byte).
    pub fn untyped(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        Self { buf, start }
    }

    /// Write a u8.
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Write a big-endian i16.
    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Write a big-endian i32.
    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Write a big-endian u32.
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Write raw bytes.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Write a null-terminated string.
    pub fn cstr(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    /// Fill in the length field.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}
