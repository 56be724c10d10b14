//! Variable binding (varbind) type.
//!
//! A varbind pairs an OID with a typed value. On the wire each varbind is
//! `SEQUENCE { OBJECT IDENTIFIER, value }` and a varbind list is a
//! SEQUENCE of those.

use crate::ber::{tag, Decoder, Encoder};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::value::Value;

/// An OID-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new varbind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a varbind with a NULL value, as carried by GET-class requests.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Create a varbind carrying the noSuchObject exception.
    pub fn no_such_object(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::NoSuchObject,
        }
    }

    /// Create a varbind carrying the endOfMibView exception.
    pub fn end_of_mib_view(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::EndOfMibView,
        }
    }

    /// Encode as `SEQUENCE { oid, value }`, returning the encoded size.
    pub fn encode(&self, enc: &mut Encoder) -> Result<usize> {
        let header = enc.begin(tag::SEQUENCE);
        let mut content = enc.write_oid(&self.oid)?;
        content += self.value.encode(enc)?;
        Ok(enc.end(header, content))
    }

    /// Decode one varbind, enforcing that the inner SEQUENCE is consumed
    /// exactly.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        if !seq.is_empty() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::TrailingData {
                    declared: seq.offset() + seq.remaining(),
                    consumed: seq.offset(),
                },
            ));
        }
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a varbind list as a SEQUENCE, returning the encoded size.
pub fn encode_varbind_list(enc: &mut Encoder, varbinds: &[VarBind]) -> Result<usize> {
    let header = enc.begin(tag::SEQUENCE);
    let mut content = 0;
    for vb in varbinds {
        content += vb.encode(enc)?;
    }
    Ok(enc.end(header, content))
}

/// Decode a varbind list SEQUENCE.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;
    let mut varbinds = Vec::with_capacity((seq.remaining() / 16).max(1));
    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }
    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::EncoderFactory;
    use crate::oid;
    use bytes::Bytes;

    fn roundtrip_list(varbinds: &[VarBind]) -> Vec<VarBind> {
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        encode_varbind_list(&mut enc, varbinds).unwrap();
        let bytes = enc.finish();
        let mut decoder = Decoder::new(bytes);
        decode_varbind_list(&mut decoder).unwrap()
    }

    #[test]
    fn test_varbind_roundtrip() {
        let vb = VarBind::new(oid!(1, 3, 6, 1), Value::Integer(42));
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        vb.encode(&mut enc).unwrap();
        let mut decoder = Decoder::new(enc.finish());
        assert_eq!(VarBind::decode(&mut decoder).unwrap(), vb);
    }

    #[test]
    fn test_varbind_known_answer() {
        // SEQ { OID 1.3.6.1, NULL }
        let vb = VarBind::null(oid!(1, 3, 6, 1));
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        vb.encode(&mut enc).unwrap();
        assert_eq!(
            enc.finish().to_vec(),
            vec![0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00]
        );
    }

    #[test]
    fn test_list_roundtrip() {
        let varbinds = vec![
            VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                Value::OctetString(Bytes::from_static(b"Test System Description")),
            ),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123_456)),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 99, 0), Value::NoSuchObject),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), Value::Counter64(u64::MAX)),
            VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)),
        ];
        assert_eq!(roundtrip_list(&varbinds), varbinds);
    }

    #[test]
    fn test_empty_list_roundtrip() {
        assert!(roundtrip_list(&[]).is_empty());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes_in_varbind() {
        // SEQ { OID 1.3, NULL, stray INTEGER }
        let data = [
            0x30, 0x08, 0x06, 0x01, 0x2B, 0x05, 0x00, 0x02, 0x01, 0x00,
        ];
        let mut decoder = Decoder::from_slice(&data);
        assert!(VarBind::decode(&mut decoder).is_err());
    }

    #[test]
    fn test_display() {
        let vb = VarBind::new(oid!(1, 3, 6, 1), Value::Integer(42));
        assert_eq!(vb.to_string(), "1.3.6.1 = 42");
    }
}
