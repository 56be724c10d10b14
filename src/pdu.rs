//! SNMP Protocol Data Units.
//!
//! [`Pdu`] covers the request/response family sharing the
//! `{request_id, error_status, error_index, varbinds}` layout; GETBULK
//! reuses the two error fields as non-repeaters and max-repetitions.
//! [`TrapV1Pdu`] is the SNMPv1 trap with its distinct control fields.

use crate::ber::{tag, Decoder, Encoder};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{decode_varbind_list, encode_varbind_list, VarBind};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from the tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// True for the tags introduced by SNMPv2.
    pub fn is_v2_only(self) -> bool {
        matches!(
            self,
            Self::GetBulkRequest | Self::InformRequest | Self::TrapV2 | Self::Report
        )
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Request/response PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type.
    pub pdu_type: PduType,
    /// Request id correlating requests and responses.
    pub request_id: u32,
    /// Error status (or non-repeaters for GETBULK).
    pub error_status: i32,
    /// 1-based index of the failing varbind; 0 when no error (or
    /// max-repetitions for GETBULK).
    pub error_index: i32,
    /// Variable bindings.
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET request over NULL-valued varbinds.
    pub fn get_request(request_id: u32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a GETNEXT request over NULL-valued varbinds.
    pub fn get_next_request(request_id: u32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetNextRequest,
            ..Self::get_request(request_id, oids)
        }
    }

    /// Create a SET request.
    pub fn set_request(request_id: u32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a GETBULK request.
    ///
    /// The error fields carry `non_repeaters` and `max_repetitions`.
    pub fn get_bulk(
        request_id: u32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Non-repeaters count of a GETBULK PDU.
    pub fn non_repeaters(&self) -> usize {
        self.error_status.max(0) as usize
    }

    /// Max-repetitions count of a GETBULK PDU.
    pub fn max_repetitions(&self) -> usize {
        self.error_index.max(0) as usize
    }

    /// True when the response carries a protocol error.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// The error status as an enum (None for out-of-range, which only
    /// arises on locally built PDUs; decoded PDUs are pre-validated).
    pub fn error_status_enum(&self) -> Option<ErrorStatus> {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Build the Response PDU shell for this request: same request id,
    /// no error, empty varbinds.
    pub fn to_response(&self) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::with_capacity(self.varbinds.len()),
        }
    }

    /// Encode as a tagged constructed TLV, returning the encoded size.
    pub fn encode(&self, enc: &mut Encoder) -> Result<usize> {
        let header = enc.begin(self.pdu_type.tag());
        let mut content = enc.write_integer(i64::from(self.request_id));
        content += enc.write_integer(i64::from(self.error_status));
        content += enc.write_integer(i64::from(self.error_index));
        content += encode_varbind_list(enc, &self.varbinds)?;
        Ok(enc.end(header, content))
    }

    /// Decode the PDU body after the caller consumed the tag byte.
    pub(crate) fn decode_body(pdu_type: PduType, decoder: &mut Decoder) -> Result<Self> {
        let len = decoder.read_length()?;
        let content = decoder.read_bytes(len)?;
        let mut body = Decoder::new(content);

        let request_id = body.read_u32()?;
        let error_status_offset = body.offset();
        let error_status = body.read_i32()?;
        let error_index = body.read_i32()?;

        // For GETBULK these fields are non-repeaters/max-repetitions, not
        // an error status.
        if pdu_type != PduType::GetBulkRequest && ErrorStatus::from_i32(error_status).is_none() {
            return Err(Error::decode(
                error_status_offset,
                DecodeErrorKind::InvalidErrorStatus(error_status),
            ));
        }

        let varbinds = decode_varbind_list(&mut body)?;
        if !body.is_empty() {
            return Err(Error::decode(
                body.offset(),
                DecodeErrorKind::TrailingData {
                    declared: len,
                    consumed: body.offset(),
                },
            ));
        }

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// SNMPv1 generic trap codes (RFC 1157).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    /// Vendor-specific; see the specific-trap field.
    EnterpriseSpecific = 6,
}

impl GenericTrap {
    /// Create from the wire value.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ColdStart),
            1 => Some(Self::WarmStart),
            2 => Some(Self::LinkDown),
            3 => Some(Self::LinkUp),
            4 => Some(Self::AuthenticationFailure),
            5 => Some(Self::EgpNeighborLoss),
            6 => Some(Self::EnterpriseSpecific),
            _ => None,
        }
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv1 Trap PDU (tag 0xA4).
///
/// Replaces the request-id/error control fields with trap-specific ones.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// Enterprise OID of the emitting entity.
    pub enterprise: Oid,
    /// IPv4 address of the emitting agent.
    pub agent_addr: [u8; 4],
    /// Generic trap code.
    pub generic_trap: i32,
    /// Specific trap code (meaningful for enterpriseSpecific).
    pub specific_trap: i32,
    /// sysUpTime at emission, in hundredths of seconds.
    pub timestamp: u32,
    /// Variable bindings.
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Create a new v1 trap PDU.
    pub fn new(
        enterprise: Oid,
        agent_addr: [u8; 4],
        generic_trap: GenericTrap,
        specific_trap: i32,
        timestamp: u32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            enterprise,
            agent_addr,
            generic_trap: generic_trap.as_i32(),
            specific_trap,
            timestamp,
            varbinds,
        }
    }

    /// The generic trap code as an enum.
    pub fn generic_trap_enum(&self) -> Option<GenericTrap> {
        GenericTrap::from_i32(self.generic_trap)
    }

    /// Encode as a 0xA4 constructed TLV, returning the encoded size.
    pub fn encode(&self, enc: &mut Encoder) -> Result<usize> {
        let header = enc.begin(PduType::TrapV1.tag());
        let mut content = enc.write_oid(&self.enterprise)?;
        content += enc.write_ip_address(self.agent_addr);
        content += enc.write_integer(i64::from(self.generic_trap));
        content += enc.write_integer(i64::from(self.specific_trap));
        content += enc.write_unsigned32(tag::TIMETICKS, self.timestamp);
        content += encode_varbind_list(enc, &self.varbinds)?;
        Ok(enc.end(header, content))
    }

    /// Decode the trap body after the caller consumed the 0xA4 tag byte.
    pub(crate) fn decode_body(decoder: &mut Decoder) -> Result<Self> {
        let len = decoder.read_length()?;
        let content = decoder.read_bytes(len)?;
        let mut body = Decoder::new(content);

        let enterprise = body.read_oid()?;
        let agent_addr = body.read_ip_address()?;
        let generic_trap = body.read_i32()?;
        let specific_trap = body.read_i32()?;
        let timestamp = body.read_unsigned32(tag::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut body)?;
        if !body.is_empty() {
            return Err(Error::decode(
                body.offset(),
                DecodeErrorKind::TrailingData {
                    declared: len,
                    consumed: body.offset(),
                },
            ));
        }

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            timestamp,
            varbinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::EncoderFactory;
    use crate::oid;
    use crate::value::Value;

    fn encode_pdu(pdu: &Pdu) -> Decoder {
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        pdu.encode(&mut enc).unwrap();
        Decoder::new(enc.finish())
    }

    fn decode_pdu(decoder: &mut Decoder) -> Result<Pdu> {
        let tag_byte = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag_byte).unwrap();
        Pdu::decode_body(pdu_type, decoder)
    }

    #[test]
    fn test_get_request_roundtrip() {
        let pdu = Pdu::get_request(12345, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let mut dec = encode_pdu(&pdu);
        let decoded = decode_pdu(&mut dec).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn test_large_request_id_roundtrip() {
        // u32 ids above i32::MAX must survive the signed wire integer
        let pdu = Pdu::get_request(0xFFFF_FFFE, &[oid!(1, 3, 6, 1)]);
        let mut dec = encode_pdu(&pdu);
        let decoded = decode_pdu(&mut dec).unwrap();
        assert_eq!(decoded.request_id, 0xFFFF_FFFE);
    }

    #[test]
    fn test_getbulk_fields() {
        let pdu = Pdu::get_bulk(7, 1, 10, &[oid!(1, 3, 6, 1, 2, 1, 1)]);
        assert_eq!(pdu.non_repeaters(), 1);
        assert_eq!(pdu.max_repetitions(), 10);

        let mut dec = encode_pdu(&pdu);
        let decoded = decode_pdu(&mut dec).unwrap();
        assert_eq!(decoded.non_repeaters(), 1);
        assert_eq!(decoded.max_repetitions(), 10);
    }

    #[test]
    fn test_getbulk_error_fields_not_status_validated() {
        // max_repetitions = 50 would be an invalid error status; as a
        // GETBULK field it must pass
        let pdu = Pdu::get_bulk(1, 0, 50, &[oid!(1, 3, 6)]);
        let mut dec = encode_pdu(&pdu);
        assert!(decode_pdu(&mut dec).is_ok());
    }

    #[test]
    fn test_invalid_error_status_rejected() {
        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: 1,
            error_status: 19,
            error_index: 0,
            varbinds: vec![],
        };
        let mut dec = encode_pdu(&pdu);
        assert!(decode_pdu(&mut dec).is_err());
    }

    #[test]
    fn test_to_response() {
        let req = Pdu::get_request(99, &[oid!(1, 3, 6, 1)]);
        let resp = req.to_response();
        assert_eq!(resp.pdu_type, PduType::Response);
        assert_eq!(resp.request_id, 99);
        assert_eq!(resp.error_status, 0);
        assert!(resp.varbinds.is_empty());
    }

    #[test]
    fn test_trap_v1_roundtrip() {
        let trap = TrapV1Pdu::new(
            oid!(1, 3, 6, 1, 4, 1, 424242),
            [192, 168, 1, 1],
            GenericTrap::LinkDown,
            0,
            12_345_678,
            vec![VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1),
                Value::Integer(1),
            )],
        );

        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        trap.encode(&mut enc).unwrap();
        let mut dec = Decoder::new(enc.finish());
        assert_eq!(dec.read_tag().unwrap(), 0xA4);
        let decoded = TrapV1Pdu::decode_body(&mut dec).unwrap();
        assert_eq!(decoded, trap);
        assert_eq!(decoded.generic_trap_enum(), Some(GenericTrap::LinkDown));
    }

    #[test]
    fn test_pdu_type_tags() {
        for (tag_byte, pdu_type) in [
            (0xA0, PduType::GetRequest),
            (0xA1, PduType::GetNextRequest),
            (0xA2, PduType::Response),
            (0xA3, PduType::SetRequest),
            (0xA4, PduType::TrapV1),
            (0xA5, PduType::GetBulkRequest),
            (0xA6, PduType::InformRequest),
            (0xA7, PduType::TrapV2),
            (0xA8, PduType::Report),
        ] {
            assert_eq!(PduType::from_tag(tag_byte), Some(pdu_type));
            assert_eq!(pdu_type.tag(), tag_byte);
        }
        assert_eq!(PduType::from_tag(0xA9), None);
        assert_eq!(PduType::from_tag(0x30), None);
    }

    #[test]
    fn test_v2_only_tags() {
        assert!(PduType::GetBulkRequest.is_v2_only());
        assert!(PduType::InformRequest.is_v2_only());
        assert!(PduType::TrapV2.is_v2_only());
        assert!(PduType::Report.is_v2_only());
        assert!(!PduType::GetRequest.is_v2_only());
        assert!(!PduType::TrapV1.is_v2_only());
    }
}
