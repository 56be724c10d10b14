//! SNMP value types.
//!
//! [`Value`] is the tagged sum over every wire type a varbind can carry.
//! The wire tag is the discriminant; the exception values (`NoSuchObject`,
//! `NoSuchInstance`, `EndOfMibView`) are ordinary variants, not errors.

use crate::ber::{tag, Decoder, Encoder};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// INTEGER (0x02), signed 32-bit
    Integer(i32),
    /// BIT STRING (0x03)
    BitString(BitString),
    /// OCTET STRING (0x04), may be empty
    OctetString(Bytes),
    /// NULL (0x05)
    Null,
    /// OBJECT IDENTIFIER (0x06)
    ObjectIdentifier(Oid),
    /// IpAddress (0x40), 4 bytes
    IpAddress([u8; 4]),
    /// Counter32 (0x41), wrapping unsigned 32-bit
    Counter32(u32),
    /// Gauge32 (0x42), non-wrapping unsigned 32-bit
    Gauge32(u32),
    /// TimeTicks (0x43), hundredths of seconds
    TimeTicks(u32),
    /// Opaque (0x44), arbitrary bytes
    Opaque(Bytes),
    /// NsapAddress (0x45), 6 bytes
    NsapAddress([u8; 6]),
    /// Counter64 (0x46), unsigned 64-bit. SNMPv2c only.
    Counter64(u64),
    /// Unsigned32 (0x47)
    Uint32(u32),
    /// noSuchObject exception (0x80)
    NoSuchObject,
    /// noSuchInstance exception (0x81)
    NoSuchInstance,
    /// endOfMibView exception (0x82)
    EndOfMibView,
}

impl Value {
    /// Try to get as i32 ([`Value::Integer`] only).
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32 (Counter32, Gauge32, TimeTicks, Uint32, or a
    /// non-negative Integer).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) | Value::Uint32(v) => {
                Some(*v)
            }
            Value::Integer(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    /// Try to get as u64 (Counter64 or anything [`as_u32`](Self::as_u32)
    /// accepts).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    /// Try to get as bytes ([`Value::OctetString`] or [`Value::Opaque`]).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as an OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as an IPv4 address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// True for the v2c exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode as a TLV, returning the encoded size.
    pub fn encode(&self, enc: &mut Encoder) -> Result<usize> {
        Ok(match self {
            Value::Integer(v) => enc.write_integer(i64::from(*v)),
            Value::BitString(bits) => enc.write_bit_string(bits),
            Value::OctetString(data) => enc.write_octet_string(data),
            Value::Null => enc.write_null(tag::NULL),
            Value::ObjectIdentifier(oid) => enc.write_oid(oid)?,
            Value::IpAddress(addr) => enc.write_ip_address(*addr),
            Value::Counter32(v) => enc.write_unsigned32(tag::COUNTER32, *v),
            Value::Gauge32(v) => enc.write_unsigned32(tag::GAUGE32, *v),
            Value::TimeTicks(v) => enc.write_unsigned32(tag::TIMETICKS, *v),
            Value::Opaque(data) => enc.write_tagged_bytes(tag::OPAQUE, data),
            Value::NsapAddress(addr) => enc.write_nsap_address(*addr),
            Value::Counter64(v) => enc.write_unsigned64(tag::COUNTER64, *v),
            Value::Uint32(v) => enc.write_unsigned32(tag::UINT32, *v),
            Value::NoSuchObject => enc.write_null(tag::NO_SUCH_OBJECT),
            Value::NoSuchInstance => enc.write_null(tag::NO_SUCH_INSTANCE),
            Value::EndOfMibView => enc.write_null(tag::END_OF_MIB_VIEW),
        })
    }

    /// Decode one TLV.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let value_tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match value_tag {
            tag::INTEGER => Ok(Value::Integer(decoder.read_i32_value(len)?)),
            tag::BIT_STRING => Ok(Value::BitString(BitString::decode_content(decoder, len)?)),
            tag::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::NULL => {
                if len != 0 {
                    return Err(Error::decode(decoder.offset(), DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::OBJECT_IDENTIFIER => Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?)),
            tag::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([data[0], data[1], data[2], data[3]]))
            }
            tag::COUNTER32 => Ok(Value::Counter32(decoder.read_u32_value(len)?)),
            tag::GAUGE32 => Ok(Value::Gauge32(decoder.read_u32_value(len)?)),
            tag::TIMETICKS => Ok(Value::TimeTicks(decoder.read_u32_value(len)?)),
            tag::OPAQUE => Ok(Value::Opaque(decoder.read_bytes(len)?)),
            tag::NSAP_ADDRESS => {
                if len != 6 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidNsapAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(6)?;
                Ok(Value::NsapAddress([
                    data[0], data[1], data[2], data[3], data[4], data[5],
                ]))
            }
            tag::COUNTER64 => Ok(Value::Counter64(decoder.read_u64_value(len)?)),
            tag::UINT32 => Ok(Value::Uint32(decoder.read_u32_value(len)?)),
            tag::NO_SUCH_OBJECT | tag::NO_SUCH_INSTANCE | tag::END_OF_MIB_VIEW => {
                if len != 0 {
                    return Err(Error::decode(decoder.offset(), DecodeErrorKind::InvalidNull));
                }
                Ok(match value_tag {
                    tag::NO_SUCH_OBJECT => Value::NoSuchObject,
                    tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
                    _ => Value::EndOfMibView,
                })
            }
            other => Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::UnknownTag(other),
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::BitString(bits) => write!(f, "{}", bits),
            Value::OctetString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "{}", s)
                } else {
                    write!(f, "0x{}", hex(data))
                }
            }
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) | Value::Gauge32(v) | Value::Uint32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex(data)),
            Value::NsapAddress(a) => write!(f, "Nsap(0x{})", hex(a)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

/// An ASN.1 BIT STRING, padded to whole bytes in memory.
///
/// The wire content is `[padding_bits, data...]` where `padding_bits` is
/// the number of unused low bits in the final byte (0..=7); the logical
/// bit length is `data.len() * 8 - padding_bits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitString {
    bytes: Bytes,
    bit_len: usize,
}

impl BitString {
    /// Create from padded bytes and a logical bit length.
    ///
    /// Returns `None` when `bit_len` does not fit the byte count.
    pub fn from_bytes(bytes: Bytes, bit_len: usize) -> Option<Self> {
        let capacity = bytes.len() * 8;
        if bit_len > capacity || (!bytes.is_empty() && capacity - bit_len >= 8) {
            return None;
        }
        Some(Self { bytes, bit_len })
    }

    /// Logical number of bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// The padded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of unused low bits in the final byte.
    pub fn padding_bits(&self) -> u8 {
        ((self.bytes.len() * 8 - self.bit_len) % 8) as u8
    }

    /// Get bit `index` (big-endian within each byte).
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        let byte = self.bytes[index / 8];
        Some(byte & (0x80 >> (index % 8)) != 0)
    }

    pub(crate) fn decode_content(decoder: &mut Decoder, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::InvalidBitString,
            ));
        }
        let start = decoder.offset();
        let content = decoder.read_bytes(len)?;
        let padding = content[0];
        let data = content.slice(1..);
        if padding > 7 || (data.is_empty() && padding != 0) {
            return Err(Error::decode(start, DecodeErrorKind::InvalidBitString));
        }
        let bit_len = data.len() * 8 - padding as usize;
        Ok(Self {
            bytes: data,
            bit_len,
        })
    }
}

impl std::fmt::Display for BitString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitString({} bits)", self.bit_len)
    }
}
