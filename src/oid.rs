//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 8]>`: most MIB OIDs fit inline
//! without a heap allocation. Values are immutable once constructed and
//! ordered lexicographically, so a strict prefix sorts before any of its
//! extensions.

use crate::error::{DecodeErrorKind, Error, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (sub-identifiers) accepted from the wire.
///
/// RFC 2578 Section 3.5 allows at most 128 sub-identifiers; the limit also
/// bounds memory taken by hostile datagrams.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 8]>,
}

impl Oid {
    /// Create an OID from arc values.
    ///
    /// # Examples
    ///
    /// ```
    /// use snmp_engine::oid::Oid;
    ///
    /// let oid = Oid::new(vec![1, 3, 6, 1, 2, 1]);
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1]);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted notation (e.g., `"1.3.6.1.2.1.1.1.0"`).
    ///
    /// Requires at least two sub-identifiers; structural validation of the
    /// first two arcs happens at encode time via [`validate`](Self::validate).
    pub fn parse(s: &str) -> Result<Self> {
        let mut arcs = SmallVec::new();
        for part in s.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::InvalidOid(format!("unparseable arc in \"{}\"", s).into()))?;
            arcs.push(arc);
        }
        if arcs.len() < 2 {
            return Err(Error::InvalidOid(
                format!("\"{}\" has fewer than 2 sub-identifiers", s).into(),
            ));
        }
        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with `prefix`.
    ///
    /// Every OID starts with itself.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.len() >= prefix.arcs.len() && self.arcs[..prefix.arcs.len()] == prefix.arcs[..]
    }

    /// Length of the common prefix of `self` and `other`.
    ///
    /// When one OID is a prefix of the other this is the prefix length;
    /// otherwise it is the index of the first disagreeing arc.
    ///
    /// # Examples
    ///
    /// ```
    /// use snmp_engine::oid;
    ///
    /// assert_eq!(oid!(1, 3, 6, 1).match_length(&oid!(1, 3, 6, 1, 2, 1)), 4);
    /// assert_eq!(oid!(1, 3, 6, 4).match_length(&oid!(1, 3, 6, 1)), 3);
    /// assert_eq!(oid!(1, 3).match_length(&oid!(2, 5)), 0);
    /// ```
    pub fn match_length(&self, other: &Oid) -> usize {
        self.arcs
            .iter()
            .zip(other.arcs.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Validate the structural invariants required for BER encoding:
    /// at least two arcs, first arc at most 6, second arc below 40.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.len() < 2 {
            return Err(Error::InvalidOid(
                format!("{} has fewer than 2 sub-identifiers", self).into(),
            ));
        }
        if self.arcs[0] > 6 {
            return Err(Error::InvalidOid(
                format!("{} has first sub-identifier above 6", self).into(),
            ));
        }
        if self.arcs[1] >= 40 {
            return Err(Error::InvalidOid(
                format!("{} has second sub-identifier above 39", self).into(),
            ));
        }
        Ok(())
    }

    /// Encode the OID content octets (without tag/length).
    ///
    /// The first two arcs combine into one sub-identifier `40*first +
    /// second`; every sub-identifier is written as big-endian base-128
    /// groups with the high bit marking continuation.
    pub(crate) fn to_ber_content(&self) -> Result<SmallVec<[u8; 32]>> {
        self.validate()?;
        let mut bytes = SmallVec::new();
        encode_subidentifier(&mut bytes, self.arcs[0] * 40 + self.arcs[1]);
        for &arc in &self.arcs[2..] {
            encode_subidentifier(&mut bytes, arc);
        }
        Ok(bytes)
    }

    /// Decode an OID from BER content octets.
    pub(crate) fn from_ber_content(data: &[u8], base_offset: usize) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(base_offset, DecodeErrorKind::IllegalOid));
        }

        let (first_subid, consumed) = decode_subidentifier(data, base_offset)?;
        let mut arcs: SmallVec<[u32; 8]> = SmallVec::new();
        arcs.push(first_subid / 40);
        arcs.push(first_subid % 40);

        let mut i = consumed;
        while i < data.len() {
            let (arc, n) = decode_subidentifier(&data[i..], base_offset + i)?;
            arcs.push(arc);
            i += n;
            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(base_offset + i, DecodeErrorKind::IllegalOid));
            }
        }

        let oid = Self { arcs };
        if oid.validate().is_err() {
            return Err(Error::decode(base_offset, DecodeErrorKind::IllegalOid));
        }
        Ok(oid)
    }
}

/// Encode one sub-identifier as base-128 groups. Zero is a single 0x00.
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 32]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }
    let mut groups = 0;
    let mut temp = value;
    while temp > 0 {
        groups += 1;
        temp >>= 7;
    }
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one sub-identifier, returning (value, bytes consumed).
///
/// Bounded at five base-128 bytes so a hostile run of continuation bits
/// cannot spin the decoder, and at u32 for the accumulated value.
fn decode_subidentifier(data: &[u8], base_offset: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == 5 {
            return Err(Error::decode(
                base_offset + i,
                DecodeErrorKind::SubIdentifierOverflow,
            ));
        }
        if value > (u32::MAX >> 7) {
            return Err(Error::decode(
                base_offset + i,
                DecodeErrorKind::SubIdentifierOverflow,
            ));
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::decode(
        base_offset + data.len(),
        DecodeErrorKind::TruncatedData,
    ))
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// # Examples
///
/// ```
/// use snmp_engine::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

/// Commonly used MIB-2 system-group instance OIDs.
pub mod well_known {
    use super::Oid;

    /// sysDescr.0
    pub fn sys_descr() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0])
    }

    /// sysObjectID.0
    pub fn sys_object_id() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 2, 0])
    }

    /// sysUpTime.0
    pub fn sys_uptime() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 3, 0])
    }

    /// sysContact.0
    pub fn sys_contact() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 4, 0])
    }

    /// sysName.0
    pub fn sys_name() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 5, 0])
    }

    /// sysLocation.0
    pub fn sys_location() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 6, 0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    }

    #[test]
    fn test_parse_rejects_short_and_garbage() {
        assert!(Oid::parse("1").is_err());
        assert!(Oid::parse("1.3.abc").is_err());
        assert!(Oid::parse("1.3.-6").is_err());
        assert!(Oid::parse("").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let oid = oid!(1, 3, 6, 1, 4, 1, 424242, 1, 1);
        let parsed: Oid = oid.to_string().parse().unwrap();
        assert_eq!(oid, parsed);
    }

    #[test]
    fn test_ordering_prefix_sorts_first() {
        let prefix = oid!(1, 3, 6);
        let extension = oid!(1, 3, 6, 1, 2);
        assert!(prefix < extension);
        assert!(oid!(1, 3, 5) < prefix);
        assert!(oid!(1, 3, 7) > extension);
    }

    #[test]
    fn test_match_length() {
        assert_eq!(oid!(1, 3, 6).match_length(&oid!(1, 3, 6, 1, 2)), 3);
        assert_eq!(oid!(1, 3, 6, 1, 2).match_length(&oid!(1, 3, 6)), 3);
        assert_eq!(oid!(1, 3, 6, 4).match_length(&oid!(1, 3, 6, 1)), 3);
        assert_eq!(oid!(1, 3).match_length(&oid!(1, 3)), 2);
        assert_eq!(oid!(2, 1).match_length(&oid!(1, 1)), 0);
    }

    #[test]
    fn test_starts_with() {
        let oid = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        assert!(oid.starts_with(&oid!(1, 3, 6, 1)));
        assert!(oid.starts_with(&oid));
        assert!(!oid!(1, 3, 6, 1).starts_with(&oid));
        assert!(!oid.starts_with(&oid!(1, 3, 7)));
    }

    #[test]
    fn test_validate() {
        assert!(oid!(1, 3, 6, 1).validate().is_ok());
        assert!(oid!(6, 39).validate().is_ok());
        assert!(oid!(7, 0).validate().is_err());
        assert!(oid!(1, 40).validate().is_err());
        assert!(Oid::from_slice(&[1]).validate().is_err());
    }

    #[test]
    fn test_ber_content_known_answer() {
        // 1.3.6.1 encodes as (1*40+3)=43, 6, 1 = [0x2B, 0x06, 0x01]
        let content = oid!(1, 3, 6, 1).to_ber_content().unwrap();
        assert_eq!(&content[..], &[0x2B, 0x06, 0x01]);
    }

    #[test]
    fn test_ber_content_multi_byte_arc() {
        // 424242 in 7-bit groups is 0x19, 0x72, 0x32
        let content = oid!(1, 3, 424242).to_ber_content().unwrap();
        assert_eq!(&content[..], &[0x2B, 0x99, 0xF2, 0x32]);
        let decoded = Oid::from_ber_content(&content, 0).unwrap();
        assert_eq!(decoded, oid!(1, 3, 424242));
    }

    #[test]
    fn test_ber_content_roundtrip() {
        for oid in [
            oid!(0, 0),
            oid!(1, 3),
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            oid!(1, 3, 6, 1, 4, 1, 424242, 1, 1),
            oid!(6, 39, u32::MAX),
        ] {
            let content = oid.to_ber_content().unwrap();
            let decoded = Oid::from_ber_content(&content, 0).unwrap();
            assert_eq!(oid, decoded);
        }
    }

    #[test]
    fn test_ber_content_zero_arc() {
        // Arc value 0 encodes as a single 0x00
        let content = oid!(1, 3, 0).to_ber_content().unwrap();
        assert_eq!(&content[..], &[0x2B, 0x00]);
    }

    #[test]
    fn test_decode_rejects_unterminated_subidentifier() {
        // Five continuation bytes with no terminator
        let result = Oid::from_ber_content(&[0x2B, 0x80, 0x80, 0x80, 0x80, 0x80], 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_overflowing_subidentifier() {
        // 0xFF repeated pushes the accumulator past 32 bits
        let result = Oid::from_ber_content(&[0x2B, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F], 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_empty_content() {
        assert!(Oid::from_ber_content(&[], 0).is_err());
    }

    #[test]
    fn test_decode_enforces_max_len() {
        let mut data = vec![0x2B];
        data.extend(std::iter::repeat(0x01).take(MAX_OID_LEN - 2));
        assert_eq!(Oid::from_ber_content(&data, 0).unwrap().len(), MAX_OID_LEN);

        data.push(0x01);
        assert!(Oid::from_ber_content(&data, 0).is_err());
    }

    #[test]
    fn test_macro() {
        let oid = oid!(1, 3, 6, 1);
        assert_eq!(oid.arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn test_well_known() {
        assert_eq!(well_known::sys_descr().to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(well_known::sys_uptime().to_string(), "1.3.6.1.2.1.1.3.0");
    }
}
