//! BER codec for the ASN.1 subset used by SNMP.
//!
//! The decoder is a zero-copy cursor over [`bytes::Bytes`]. The encoder
//! builds a chain of small pooled buffers so nested TLV headers can be
//! back-patched with their content lengths after the children are written,
//! avoiding a separate measuring pass.

mod decode;
mod encode;
mod length;
mod pool;

pub use decode::Decoder;
pub use encode::{Encoder, EncoderFactory, Header};
pub use length::{decode_length, encode_length};
pub use pool::BufferPool;

/// BER tag bytes for the SNMP value set.
pub mod tag {
    /// INTEGER
    pub const INTEGER: u8 = 0x02;
    /// BIT STRING
    pub const BIT_STRING: u8 = 0x03;
    /// OCTET STRING
    pub const OCTET_STRING: u8 = 0x04;
    /// NULL
    pub const NULL: u8 = 0x05;
    /// OBJECT IDENTIFIER
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    /// SEQUENCE (constructed)
    pub const SEQUENCE: u8 = 0x30;
    /// IpAddress (application 0)
    pub const IP_ADDRESS: u8 = 0x40;
    /// Counter32 (application 1)
    pub const COUNTER32: u8 = 0x41;
    /// Gauge32 (application 2)
    pub const GAUGE32: u8 = 0x42;
    /// TimeTicks (application 3)
    pub const TIMETICKS: u8 = 0x43;
    /// Opaque (application 4)
    pub const OPAQUE: u8 = 0x44;
    /// NsapAddress (application 5)
    pub const NSAP_ADDRESS: u8 = 0x45;
    /// Counter64 (application 6)
    pub const COUNTER64: u8 = 0x46;
    /// Unsigned32 (application 7)
    pub const UINT32: u8 = 0x47;
    /// noSuchObject exception (context 0)
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    /// noSuchInstance exception (context 1)
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    /// endOfMibView exception (context 2)
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}
