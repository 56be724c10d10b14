//! BER encoder built on a chain of pooled buffers.
//!
//! Nested TLV lengths are unknown until the children are written. Instead
//! of a measuring pass, [`Encoder::begin`] reserves a header chunk holding
//! just the tag; children append their own chunks after it; and
//! [`Encoder::end`] back-patches the header chunk with the final content
//! length. [`Encoder::finish`] concatenates the chain in order.

use std::sync::Arc;

use bytes::Bytes;

use super::length::encode_length;
use super::pool::BufferPool;
use super::tag;
use crate::error::Result;
use crate::oid::Oid;
use crate::value::BitString;

/// Shared factory handing out encoders backed by one buffer pool.
///
/// One factory per engine; encoders are cheap to create and destroy.
#[derive(Clone)]
pub struct EncoderFactory {
    pool: Arc<BufferPool>,
}

impl EncoderFactory {
    /// Create a factory with a host-sized buffer pool.
    pub fn new() -> Self {
        Self {
            pool: Arc::new(BufferPool::for_host()),
        }
    }

    /// Create a factory over an existing pool.
    pub fn with_pool(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// Create a new encoder.
    pub fn encoder(&self) -> Encoder {
        Encoder {
            chunks: Vec::new(),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl Default for EncoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot of a reserved TLV header awaiting its content length.
#[derive(Debug, Clone, Copy)]
#[must_use = "a header must be closed with Encoder::end"]
pub struct Header {
    index: usize,
}

/// BER encoder emitting a chain of pooled chunks.
///
/// All `write_*` methods emit a complete TLV and return its total encoded
/// size (tag + length + content) so parents can accumulate content lengths
/// for their own [`end`](Self::end) call.
pub struct Encoder {
    chunks: Vec<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Encoder {
    fn append(&mut self) -> &mut Vec<u8> {
        let buf = self.pool.get();
        self.chunks.push(buf);
        self.chunks.last_mut().expect("chunk just pushed")
    }

    /// Reserve a header chunk for a constructed or primitive TLV.
    pub fn begin(&mut self, tag: u8) -> Header {
        let index = self.chunks.len();
        self.append().push(tag);
        Header { index }
    }

    /// Back-patch the header with `content_len` and return the block
    /// length (header + content).
    pub fn end(&mut self, header: Header, content_len: usize) -> usize {
        let (len_buf, len_len) = encode_length(content_len);
        let chunk = &mut self.chunks[header.index];
        chunk.extend_from_slice(&len_buf[..len_len]);
        chunk.len() + content_len
    }

    /// Write an INTEGER TLV (minimal two's-complement content).
    pub fn write_integer(&mut self, value: i64) -> usize {
        let header = self.begin(tag::INTEGER);
        let chunk = self.append();
        let n = write_twos_complement(chunk, value);
        self.end(header, n)
    }

    /// Write an unsigned 32-bit value under an application tag
    /// (Counter32, Gauge32, TimeTicks, Unsigned32).
    pub fn write_unsigned32(&mut self, value_tag: u8, value: u32) -> usize {
        let header = self.begin(value_tag);
        let chunk = self.append();
        let n = write_twos_complement(chunk, i64::from(value));
        self.end(header, n)
    }

    /// Write an unsigned 64-bit value (Counter64).
    ///
    /// Values with the top bit set take a leading zero octet to stay
    /// non-negative in two's complement.
    pub fn write_unsigned64(&mut self, value_tag: u8, value: u64) -> usize {
        let header = self.begin(value_tag);
        let chunk = self.append();
        let n = if value > i64::MAX as u64 {
            chunk.push(0x00);
            chunk.extend_from_slice(&value.to_be_bytes());
            9
        } else {
            write_twos_complement(chunk, value as i64)
        };
        self.end(header, n)
    }

    /// Write an OCTET STRING TLV.
    pub fn write_octet_string(&mut self, value: &[u8]) -> usize {
        self.write_tagged_bytes(tag::OCTET_STRING, value)
    }

    /// Write raw content under an arbitrary primitive tag.
    pub fn write_tagged_bytes(&mut self, value_tag: u8, value: &[u8]) -> usize {
        let header = self.begin(value_tag);
        self.append().extend_from_slice(value);
        self.end(header, value.len())
    }

    /// Write a zero-length TLV (NULL and the exception tags).
    pub fn write_null(&mut self, value_tag: u8) -> usize {
        let header = self.begin(value_tag);
        self.end(header, 0)
    }

    /// Write an OBJECT IDENTIFIER TLV, validating the OID invariants.
    pub fn write_oid(&mut self, oid: &Oid) -> Result<usize> {
        let content = oid.to_ber_content()?;
        let header = self.begin(tag::OBJECT_IDENTIFIER);
        self.append().extend_from_slice(&content);
        Ok(self.end(header, content.len()))
    }

    /// Write an IpAddress TLV (4 raw bytes).
    pub fn write_ip_address(&mut self, addr: [u8; 4]) -> usize {
        self.write_tagged_bytes(tag::IP_ADDRESS, &addr)
    }

    /// Write an NsapAddress TLV (6 raw bytes).
    pub fn write_nsap_address(&mut self, addr: [u8; 6]) -> usize {
        self.write_tagged_bytes(tag::NSAP_ADDRESS, &addr)
    }

    /// Write a BIT STRING TLV (`[padding_bits, data...]` content form).
    pub fn write_bit_string(&mut self, bits: &BitString) -> usize {
        let header = self.begin(tag::BIT_STRING);
        let chunk = self.append();
        chunk.push(bits.padding_bits());
        chunk.extend_from_slice(bits.bytes());
        self.end(header, 1 + bits.bytes().len())
    }

    /// Total bytes written so far.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate the chain into a single contiguous datagram and return
    /// the chunks to the pool.
    pub fn finish(mut self) -> Bytes {
        let total: usize = self.chunks.iter().map(|c| c.len()).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        for chunk in std::mem::take(&mut self.chunks) {
            self.pool.put(chunk);
        }
        Bytes::from(out)
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        for chunk in std::mem::take(&mut self.chunks) {
            self.pool.put(chunk);
        }
    }
}

/// Write a minimal-length two's-complement integer, returning the byte
/// count. At least one byte; widened only when the top bit would flip the
/// sign.
fn write_twos_complement(buf: &mut Vec<u8>, value: i64) -> usize {
    let mut n = 1;
    let mut v = value;
    while v > 127 {
        n += 1;
        v >>= 8;
    }
    while v < -128 {
        n += 1;
        v >>= 8;
    }
    for i in (0..n).rev() {
        buf.push((value >> (i * 8)) as u8);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn encode_with(f: impl FnOnce(&mut Encoder)) -> Vec<u8> {
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        f(&mut enc);
        enc.finish().to_vec()
    }

    #[test]
    fn test_integer_minimal_lengths() {
        assert_eq!(encode_with(|e| {
            e.write_integer(0);
        }), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_with(|e| {
            e.write_integer(127);
        }), vec![0x02, 0x01, 0x7F]);
        assert_eq!(encode_with(|e| {
            e.write_integer(128);
        }), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encode_with(|e| {
            e.write_integer(-1);
        }), vec![0x02, 0x01, 0xFF]);
        assert_eq!(encode_with(|e| {
            e.write_integer(-128);
        }), vec![0x02, 0x01, 0x80]);
        assert_eq!(encode_with(|e| {
            e.write_integer(-129);
        }), vec![0x02, 0x02, 0xFF, 0x7F]);
    }

    #[test]
    fn test_unsigned32_top_bit_takes_leading_zero() {
        assert_eq!(
            encode_with(|e| {
                e.write_unsigned32(tag::COUNTER32, 0x8000_0000);
            }),
            vec![0x41, 0x05, 0x00, 0x80, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_unsigned64_max() {
        assert_eq!(
            encode_with(|e| {
                e.write_unsigned64(tag::COUNTER64, u64::MAX);
            }),
            vec![0x46, 0x09, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_nested_sequence_backpatch() {
        // SEQUENCE { INTEGER 1, INTEGER 2 }
        let bytes = encode_with(|e| {
            let seq = e.begin(tag::SEQUENCE);
            let mut content = e.write_integer(1);
            content += e.write_integer(2);
            e.end(seq, content);
        });
        assert_eq!(bytes, vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_long_content_gets_long_form_length() {
        // Spec scenario S3: a 200-byte octet string carries 0x81 0xC8
        let payload = vec![0xAB; 200];
        let bytes = encode_with(|e| {
            e.write_octet_string(&payload);
        });
        assert_eq!(&bytes[..3], &[0x04, 0x81, 0xC8]);
        assert_eq!(bytes.len(), 203);

        let payload = vec![0xCD; 65535];
        let bytes = encode_with(|e| {
            e.write_octet_string(&payload);
        });
        assert_eq!(&bytes[..4], &[0x04, 0x82, 0xFF, 0xFF]);
        assert_eq!(bytes.len(), 65539);
    }

    #[test]
    fn test_write_oid() {
        let bytes = encode_with(|e| {
            e.write_oid(&oid!(1, 3, 6, 1)).unwrap();
        });
        assert_eq!(bytes, vec![0x06, 0x03, 0x2B, 0x06, 0x01]);
    }

    #[test]
    fn test_write_oid_rejects_invalid() {
        let factory = EncoderFactory::new();
        let mut enc = factory.encoder();
        assert!(enc.write_oid(&oid!(7, 0)).is_err());
    }

    #[test]
    fn test_chunks_returned_to_pool() {
        let pool = Arc::new(BufferPool::new(16, 64));
        let factory = EncoderFactory::with_pool(Arc::clone(&pool));
        let mut enc = factory.encoder();
        let seq = enc.begin(tag::SEQUENCE);
        let n = enc.write_integer(5);
        enc.end(seq, n);
        let _ = enc.finish();
        assert!(pool.retained() >= 2);

        // Dropping an unfinished encoder also returns its chunks
        let before = pool.retained();
        let mut enc = factory.encoder();
        let _ = enc.begin(tag::SEQUENCE);
        drop(enc);
        assert!(pool.retained() >= before);
    }
}
