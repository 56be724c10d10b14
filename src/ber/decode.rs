//! BER decoding.
//!
//! Zero-copy decoding over `Bytes`. No partial structures escape on
//! error: every reader either consumes a complete, valid TLV or returns a
//! typed [`Error`](crate::error::Error) and the caller drops the datagram.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder reading from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    /// Create a decoder over a byte buffer.
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a decoder from a slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Current offset into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Look at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.offset)
            .ok_or_else(|| Error::decode(self.offset, DecodeErrorKind::TruncatedData))?;
        self.offset += 1;
        Ok(byte)
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length field.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::LengthOverrun {
                    length: len,
                    remaining: self.remaining(),
                },
            ));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and require a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        self.read_length()
    }

    /// Read an INTEGER TLV as i64.
    pub fn read_integer(&mut self) -> Result<i64> {
        let len = self.expect_tag(tag::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read a signed integer content of `len` bytes, sign-extending from
    /// the declared length.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i64> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 8 {
            return Err(Error::decode(self.offset, DecodeErrorKind::IntegerOutOfRange));
        }
        let bytes = self.read_bytes(len)?;
        let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter() {
            value = (value << 8) | i64::from(byte);
        }
        Ok(value)
    }

    /// Read an INTEGER TLV narrowed to i32, failing when out of range.
    pub fn read_i32(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::INTEGER)?;
        self.read_i32_value(len)
    }

    /// Narrow an integer content to i32.
    pub fn read_i32_value(&mut self, len: usize) -> Result<i32> {
        let start = self.offset;
        let wide = self.read_integer_value(len)?;
        i32::try_from(wide).map_err(|_| Error::decode(start, DecodeErrorKind::IntegerOutOfRange))
    }

    /// Read an INTEGER TLV narrowed to u32, failing when out of range.
    pub fn read_u32(&mut self) -> Result<u32> {
        let len = self.expect_tag(tag::INTEGER)?;
        self.read_u32_value(len)
    }

    /// Narrow an integer content to u32.
    pub fn read_u32_value(&mut self, len: usize) -> Result<u32> {
        let start = self.offset;
        let wide = self.read_integer_value(len)?;
        u32::try_from(wide).map_err(|_| Error::decode(start, DecodeErrorKind::IntegerOutOfRange))
    }

    /// Read an unsigned value under the given application tag
    /// (Counter32, Gauge32, TimeTicks, Unsigned32).
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_u32_value(len)
    }

    /// Read an unsigned 64-bit content (Counter64).
    ///
    /// Up to nine bytes: a leading zero octet keeps 8-byte values with the
    /// top bit set non-negative.
    pub fn read_u64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            return Err(Error::decode(self.offset, DecodeErrorKind::IntegerOutOfRange));
        }
        let start = self.offset;
        let bytes = self.read_bytes(len)?;
        if len == 9 && bytes[0] != 0 {
            return Err(Error::decode(start, DecodeErrorKind::IntegerOutOfRange));
        }
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | u64::from(byte);
        }
        Ok(value)
    }

    /// Read an OCTET STRING TLV.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL TLV.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER TLV.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read OID content of `len` bytes.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let start = self.offset;
        let bytes = self.read_bytes(len)?;
        Oid::from_ber_content(&bytes, start)
    }

    /// Read an IpAddress TLV (exactly 4 content bytes).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder scoped to its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::SEQUENCE)
    }

    /// Read a constructed TLV with the given tag, returning a decoder
    /// scoped to its contents. The sub-decoder's boundary is exactly the
    /// declared length, so nested over-reads fail as overruns.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
        })
    }
}
