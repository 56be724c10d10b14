//! BER length encoding and decoding.
//!
//! X.690 Section 8.1.3: short form is a single byte for lengths up to 127;
//! long form is `0x80 | N` followed by N big-endian length bytes. The
//! writer always chooses the minimal N. The indefinite form (0x80 alone)
//! is rejected.

use crate::error::{DecodeErrorKind, Error, Result};

/// Encode a length, returning the bytes and how many of them are used.
///
/// Uses short form for lengths up to 127, minimal long form otherwise.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut n = 0;
    let mut temp = len;
    while temp > 0 {
        n += 1;
        temp >>= 8;
    }
    buf[0] = 0x80 | n as u8;
    for i in 0..n {
        buf[1 + i] = (len >> ((n - 1 - i) * 8)) as u8;
    }
    (buf, 1 + n)
}

/// Decode a length, returning (length, bytes consumed).
///
/// `base_offset` positions error reports within the enclosing datagram.
/// The caller is responsible for checking the decoded length against the
/// remaining buffer.
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| Error::decode(base_offset, DecodeErrorKind::TruncatedData))?;

    if first == 0x80 {
        return Err(Error::decode(base_offset, DecodeErrorKind::IndefiniteLength));
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets == 0 || num_octets > 4 {
        return Err(Error::decode(base_offset, DecodeErrorKind::InvalidLength));
    }
    if data.len() < 1 + num_octets {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    }

    let mut len: usize = 0;
    for &byte in &data[1..1 + num_octets] {
        len = (len << 8) | byte as usize;
    }
    Ok((len, 1 + num_octets))
}
