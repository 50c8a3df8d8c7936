//! Protobuf wire-format primitives
//!
//! This module provides a cursor-style decoder over raw protobuf bytes,
//! used to read descriptor messages without generated code. Unit tests
//! also get a small encoder for hand-made wire fixtures.

use bytes::Bytes;
#[cfg(test)]
use bytes::{BufMut, BytesMut};
use crate::errors::WireError;

/// Protobuf varints never exceed 10 bytes
const MAX_VARINT_BYTES: usize = 10;

/// Deepest group or embedded-message nesting accepted while decoding
pub const RECURSION_LIMIT: usize = 100;

/// Protobuf wire types
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

/// A wire-format decoder owning its buffer and read position
pub struct WireDecoder {
    buf: Bytes,
    pos: usize,
}

impl WireDecoder {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    /// Check if there's more data
    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read a varint
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut result: u64 = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = *self.buf.get(self.pos).ok_or(WireError::MalformedVarint)?;
            self.pos += 1;

            result |= ((byte & 0x7F) as u64) << (7 * i);

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(WireError::MalformedVarint)
    }

    /// Read a field tag as `(field_number, wire_type)`
    pub fn read_tag(&mut self) -> Result<(u32, WireType), WireError> {
        let tag = self.read_varint()?;
        let field_number = (tag >> 3) as u32;
        let raw_type = (tag & 0x07) as u32;
        let wire_type = WireType::from_u32(raw_type)
            .ok_or(WireError::InvalidWireType(raw_type))?;
        Ok((field_number, wire_type))
    }

    /// Read length-delimited data
    pub fn read_length_delimited(&mut self) -> Result<Bytes, WireError> {
        let length = self.read_varint()?;
        let remaining = self.remaining();

        let length = usize::try_from(length)
            .ok()
            .filter(|len| *len <= remaining)
            .ok_or(WireError::TruncatedMessage {
                needed: length.min(usize::MAX as u64) as usize,
                remaining,
            })?;

        let data = self.buf.slice(self.pos..self.pos + length);
        self.pos += length;

        Ok(data)
    }

    /// Read a string
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let data = self.read_length_delimited()?;
        Ok(String::from_utf8(data.to_vec())?)
    }

    /// Read a varint-encoded bool
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_varint()? != 0)
    }

    /// Read a varint-encoded int32 (negative values are sign-extended to 10 bytes)
    pub fn read_int32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_varint()? as i64 as i32)
    }

    /// Read fixed64
    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        let bytes: [u8; 8] = self.take_array()?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read fixed32
    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        let bytes: [u8; 4] = self.take_array()?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(WireError::TruncatedMessage { needed: N, remaining });
        }

        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;

        Ok(bytes)
    }

    /// Skip a field based on wire type
    ///
    /// `field_number` is only needed to match the end tag of a group.
    pub fn skip_field(&mut self, field_number: u32, wire_type: WireType) -> Result<(), WireError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.read_fixed64()?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.read_fixed32()?;
            }
            WireType::StartGroup => self.skip_group(field_number)?,
            WireType::EndGroup => return Err(WireError::UnexpectedEndGroup),
        }
        Ok(())
    }

    /// Skip through the end tag matching `field_number`, tracking nested groups on a stack
    fn skip_group(&mut self, field_number: u32) -> Result<(), WireError> {
        let mut open = vec![field_number];

        while let Some(&current) = open.last() {
            let (field, wire_type) = self.read_tag()?;
            match wire_type {
                WireType::StartGroup => {
                    if open.len() >= RECURSION_LIMIT {
                        return Err(WireError::RecursionLimitExceeded(RECURSION_LIMIT));
                    }
                    open.push(field);
                }
                WireType::EndGroup if field == current => {
                    open.pop();
                }
                WireType::EndGroup => return Err(WireError::UnexpectedEndGroup),
                other => self.skip_field(field, other)?,
            }
        }

        Ok(())
    }
}

/// Encoder for hand-built wire fixtures
#[cfg(test)]
pub(crate) struct WireEncoder {
    buf: BytesMut,
}

#[cfg(test)]
impl WireEncoder {
    pub(crate) fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub(crate) fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub(crate) fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        self.write_varint(u64::from((field_number << 3) | wire_type as u32));
    }

    pub(crate) fn write_bytes(&mut self, field_number: u32, data: &[u8]) {
        self.write_tag(field_number, WireType::LengthDelimited);
        self.write_varint(data.len() as u64);
        self.buf.put_slice(data);
    }

    pub(crate) fn write_string(&mut self, field_number: u32, value: &str) {
        self.write_bytes(field_number, value.as_bytes());
    }

    pub(crate) fn write_message(&mut self, field_number: u32, message: WireEncoder) {
        self.write_bytes(field_number, &message.finish());
    }

    /// Negative values are sign-extended to ten bytes, as protobuf does for int32
    pub(crate) fn write_int(&mut self, field_number: u32, value: i64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_varint(value as u64);
    }

    pub(crate) fn write_bool(&mut self, field_number: u32, value: bool) {
        self.write_int(field_number, i64::from(value));
    }

    pub(crate) fn write_fixed64(&mut self, field_number: u32, value: u64) {
        self.write_tag(field_number, WireType::Fixed64);
        self.buf.put_u64_le(value);
    }

    pub(crate) fn write_fixed32(&mut self, field_number: u32, value: u32) {
        self.write_tag(field_number, WireType::Fixed32);
        self.buf.put_u32_le(value);
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
