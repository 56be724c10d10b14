//! SNMP message framing (v1/v2c community messages).
//!
//! Wire layout:
//!
//! ```text
//! SEQUENCE {
//!     INTEGER       version     -- 0 = v1, 1 = v2c
//!     OCTET STRING  community
//!     [PDU_TAG]     pdu
//! }
//! ```
//!
//! Decoding enforces the version/PDU compatibility matrix: v1 rejects the
//! v2c-only tags (GETBULK, INFORM, V2 trap, REPORT) and v2c rejects the
//! v1 trap.

use crate::ber::{Decoder, EncoderFactory};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::version::Version;
use bytes::Bytes;

/// A community message carrying a request/response PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    /// SNMP version (v1 or v2c).
    pub version: Version,
    /// Community string, carried in the clear.
    pub community: Bytes,
    /// The PDU.
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a v2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version: Version::V2c,
            community: community.into(),
            pdu,
        }
    }

    /// Create a v1 message.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version: Version::V1,
            community: community.into(),
            pdu,
        }
    }

    /// Encode to a wire datagram.
    pub fn encode(&self, factory: &EncoderFactory) -> Result<Bytes> {
        let mut enc = factory.encoder();
        let header = enc.begin(crate::ber::tag::SEQUENCE);
        let mut content = enc.write_integer(i64::from(self.version.as_i32()));
        content += enc.write_octet_string(&self.community);
        content += self.pdu.encode(&mut enc)?;
        enc.end(header, content);
        Ok(enc.finish())
    }
}

/// A v1 trap message.
#[derive(Debug, Clone, PartialEq)]
pub struct V1TrapMessage {
    /// Community string.
    pub community: Bytes,
    /// The trap PDU.
    pub trap: TrapV1Pdu,
}

impl V1TrapMessage {
    /// Create a v1 trap message.
    pub fn new(community: impl Into<Bytes>, trap: TrapV1Pdu) -> Self {
        Self {
            community: community.into(),
            trap,
        }
    }

    /// Encode to a wire datagram.
    pub fn encode(&self, factory: &EncoderFactory) -> Result<Bytes> {
        let mut enc = factory.encoder();
        let header = enc.begin(crate::ber::tag::SEQUENCE);
        let mut content = enc.write_integer(i64::from(Version::V1.as_i32()));
        content += enc.write_octet_string(&self.community);
        content += self.trap.encode(&mut enc)?;
        enc.end(header, content);
        Ok(enc.finish())
    }
}

/// Any decoded SNMP message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// v1/v2c message with a request/response PDU.
    Community(CommunityMessage),
    /// v1 trap.
    TrapV1(V1TrapMessage),
}

impl Message {
    /// The SNMP version.
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::TrapV1(_) => Version::V1,
        }
    }

    /// The PDU type.
    pub fn pdu_type(&self) -> PduType {
        match self {
            Message::Community(m) => m.pdu.pdu_type,
            Message::TrapV1(_) => PduType::TrapV1,
        }
    }

    /// Encode to a wire datagram.
    pub fn encode(&self, factory: &EncoderFactory) -> Result<Bytes> {
        match self {
            Message::Community(m) => m.encode(factory),
            Message::TrapV1(m) => m.encode(factory),
        }
    }

    /// Decode a datagram.
    ///
    /// The outer SEQUENCE must span the datagram exactly; the PDU tag is
    /// validated against the version before the body is parsed.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        if !decoder.is_empty() {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::TrailingData {
                    declared: decoder.offset(),
                    consumed: decoder.offset() + decoder.remaining(),
                },
            ));
        }

        let version_offset = seq.offset();
        let version_num = seq.read_i32()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(version_offset, DecodeErrorKind::UnknownVersion(version_num))
        })?;

        let community = seq.read_octet_string()?;

        let tag_offset = seq.offset();
        let pdu_tag = seq.read_tag()?;
        let pdu_type = PduType::from_tag(pdu_tag)
            .ok_or_else(|| Error::decode(tag_offset, DecodeErrorKind::UnknownPduType(pdu_tag)))?;

        let compatible = match version {
            Version::V1 => !pdu_type.is_v2_only(),
            Version::V2c => pdu_type != PduType::TrapV1,
        };
        if !compatible {
            return Err(Error::decode(
                tag_offset,
                DecodeErrorKind::InvalidPduForVersion {
                    pdu_tag,
                    version: version.as_i32(),
                },
            ));
        }

        let message = if pdu_type == PduType::TrapV1 {
            let trap = TrapV1Pdu::decode_body(&mut seq)?;
            Message::TrapV1(V1TrapMessage { community, trap })
        } else {
            let pdu = Pdu::decode_body(pdu_type, &mut seq)?;
            Message::Community(CommunityMessage {
                version,
                community,
                pdu,
            })
        };

        if !seq.is_empty() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::TrailingData {
                    declared: seq.offset() + seq.remaining(),
                    consumed: seq.offset(),
                },
            ));
        }
        Ok(message)
    }
}
