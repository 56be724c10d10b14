//! Error types for snmp-engine.
//!
//! Three layers of failure are kept distinct:
//!
//! - [`Error`] - wire, protocol, and configuration errors returned by
//!   library calls
//! - [`TransportError`] - the terminal outcome of a tracked request
//!   (timeout after retries, or engine shutdown), surfaced on the request
//!   handle rather than through a `Result`
//! - [`HandlerError`](crate::handler::HandlerError) - failures from user
//!   OID handlers, isolated to a single varbind

use std::net::SocketAddr;

use crate::oid::Oid;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all snmp-engine operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed BER data encountered while decoding.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        /// Byte offset into the datagram where decoding failed.
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// A value that cannot be represented on the wire.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// Network failure (bind, send, receive).
    #[error("network error on {addr}: {source}")]
    Network {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// A handler is already registered for this prefix.
    #[error("handler already registered for prefix {0}")]
    DuplicateHandler(Oid),

    /// The requested stats bin does not exist or holds no data yet.
    #[error("stats bin {bin} is not available")]
    StatsBinUnavailable { bin: u8 },

    /// The engine has been shut down; the operation cannot be served.
    #[error("engine is shut down")]
    EngineShutdown,
}

impl Error {
    /// Construct a decode error at the given offset.
    pub(crate) fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Error::Decode { offset, kind }
    }
}

/// Detailed reason a BER decode failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Ran out of input mid-TLV.
    TruncatedData,
    /// A TLV claimed more content than the buffer holds.
    LengthOverrun { length: usize, remaining: usize },
    /// Indefinite-form length (0x80) is not used by SNMP.
    IndefiniteLength,
    /// Long-form length with zero or more than four length octets.
    InvalidLength,
    /// Found a different tag than the grammar requires.
    UnexpectedTag { expected: u8, actual: u8 },
    /// A tag outside the SNMP value set.
    UnknownTag(u8),
    /// INTEGER with zero-length content.
    ZeroLengthInteger,
    /// Decoded integer does not fit the target width.
    IntegerOutOfRange,
    /// OID sub-identifier ran past five base-128 bytes or overflowed u32.
    SubIdentifierOverflow,
    /// OID violating the structural invariants (length, first two arcs).
    IllegalOid,
    /// NULL or exception tag with non-zero length.
    InvalidNull,
    /// IpAddress content was not exactly 4 bytes.
    InvalidIpAddressLength { length: usize },
    /// NsapAddress content was not exactly 6 bytes.
    InvalidNsapAddressLength { length: usize },
    /// BIT STRING with no padding octet or padding count above 7.
    InvalidBitString,
    /// A nested structure did not consume exactly its declared length.
    TrailingData { declared: usize, consumed: usize },
    /// Version integer other than 0 (v1) or 1 (v2c).
    UnknownVersion(i32),
    /// PDU tag outside 0xA0..=0xA8.
    UnknownPduType(u8),
    /// PDU tag not permitted for the message version.
    InvalidPduForVersion { pdu_tag: u8, version: i32 },
    /// error-status outside the SNMP error enum 0..=18.
    InvalidErrorStatus(i32),
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedData => write!(f, "unexpected end of input"),
            Self::LengthOverrun { length, remaining } => {
                write!(f, "length {} exceeds remaining {} bytes", length, remaining)
            }
            Self::IndefiniteLength => write!(f, "indefinite-form length not supported"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, found 0x{:02X}", expected, actual)
            }
            Self::UnknownTag(tag) => write!(f, "unknown value tag 0x{:02X}", tag),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerOutOfRange => write!(f, "integer out of range for target type"),
            Self::SubIdentifierOverflow => write!(f, "OID sub-identifier overflows 32 bits"),
            Self::IllegalOid => write!(f, "illegal object identifier"),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress length {} (must be 4)", length)
            }
            Self::InvalidNsapAddressLength { length } => {
                write!(f, "NsapAddress length {} (must be 6)", length)
            }
            Self::InvalidBitString => write!(f, "invalid BIT STRING content"),
            Self::TrailingData { declared, consumed } => {
                write!(
                    f,
                    "declared length {} but nested decode consumed {}",
                    declared, consumed
                )
            }
            Self::UnknownVersion(v) => write!(f, "unsupported SNMP version {}", v),
            Self::UnknownPduType(tag) => write!(f, "unknown PDU tag 0x{:02X}", tag),
            Self::InvalidPduForVersion { pdu_tag, version } => {
                write!(
                    f,
                    "PDU tag 0x{:02X} not valid for SNMP version {}",
                    pdu_tag, version
                )
            }
            Self::InvalidErrorStatus(v) => write!(f, "error-status {} outside 0..=18", v),
        }
    }
}

/// Terminal transport outcome of a tracked request.
///
/// Carried on the request handle; exactly one of a response or a transport
/// error is present once `send_request` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request exhausted its retries without a response.
    #[error("request timed out")]
    Timeout,
    /// The engine shut down before a response arrived.
    #[error("engine shut down before a response arrived")]
    Shutdown,
}

/// SNMP protocol error status codes (RFC 3416), wire values 0..=18.
///
/// Inbound messages with an error-status outside this range are rejected
/// at decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorStatus {
    NoError = 0,
    TooBig = 1,
    NoSuchName = 2,
    BadValue = 3,
    ReadOnly = 4,
    GenErr = 5,
    NoAccess = 6,
    WrongType = 7,
    WrongLength = 8,
    WrongEncoding = 9,
    WrongValue = 10,
    NoCreation = 11,
    InconsistentValue = 12,
    ResourceUnavailable = 13,
    CommitFailed = 14,
    UndoFailed = 15,
    AuthorizationError = 16,
    NotWritable = 17,
    InconsistentName = 18,
}

impl ErrorStatus {
    /// Create from the wire value; `None` outside 0..=18.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            _ => return None,
        })
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoError => "noError",
            Self::TooBig => "tooBig",
            Self::NoSuchName => "noSuchName",
            Self::BadValue => "badValue",
            Self::ReadOnly => "readOnly",
            Self::GenErr => "genErr",
            Self::NoAccess => "noAccess",
            Self::WrongType => "wrongType",
            Self::WrongLength => "wrongLength",
            Self::WrongEncoding => "wrongEncoding",
            Self::WrongValue => "wrongValue",
            Self::NoCreation => "noCreation",
            Self::InconsistentValue => "inconsistentValue",
            Self::ResourceUnavailable => "resourceUnavailable",
            Self::CommitFailed => "commitFailed",
            Self::UndoFailed => "undoFailed",
            Self::AuthorizationError => "authorizationError",
            Self::NotWritable => "notWritable",
            Self::InconsistentName => "inconsistentName",
        };
        f.write_str(name)
    }
}
