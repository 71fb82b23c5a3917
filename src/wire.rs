//! Codec primitives for the zkif payload encoding.
//!
//! A payload is a flat sequence of field records, each carrying a
//! one-byte field id and a little-endian `u32` length. Decoders skip
//! records with ids they do not recognize, which is what keeps the
//! format forward compatible; every length is checked against the
//! enclosing buffer before any byte of the record is interpreted.

use crate::{Error, Result};

/// Bounds-checked reader over a payload slice.
///
/// The cursor tracks its absolute offset within the frame payload so
/// failures can point at the exact byte that broke the decode.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    /// Wrap a full payload.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, base: 0 }
    }

    const fn sub(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    /// Bytes not yet consumed.
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte was consumed.
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Absolute offset within the frame payload.
    pub const fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn malformed<T>(&self, context: &'static str) -> Result<T> {
        Err(Error::MalformedMessage {
            context,
            offset: self.offset(),
        })
    }

    /// Consume `n` raw bytes.
    pub fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return self.malformed(context);
        }

        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;

        Ok(bytes)
    }

    /// Consume a single byte.
    pub fn u8(&mut self, context: &'static str) -> Result<u8> {
        self.take(1, context).map(|b| b[0])
    }

    /// Consume a little-endian `u32`.
    pub fn u32(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.take(4, context)?;
        let mut le = [0u8; 4];

        le.copy_from_slice(bytes);

        Ok(u32::from_le_bytes(le))
    }

    /// Consume a little-endian `u64`.
    pub fn u64(&mut self, context: &'static str) -> Result<u64> {
        let bytes = self.take(8, context)?;
        let mut le = [0u8; 8];

        le.copy_from_slice(bytes);

        Ok(u64::from_le_bytes(le))
    }

    /// Consume a little-endian `i64`.
    pub fn i64(&mut self, context: &'static str) -> Result<i64> {
        self.u64(context).map(|n| n as i64)
    }

    /// Consume a `u32`-length-prefixed byte run.
    pub fn bytes(&mut self, context: &'static str) -> Result<&'a [u8]> {
        let len = self.u32(context)? as usize;

        self.take(len, context)
    }

    /// Consume a `u32`-length-prefixed UTF-8 string.
    pub fn text(&mut self, context: &'static str) -> Result<String> {
        let offset = self.offset();
        let bytes = self.bytes(context)?;

        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidEncoding { context, offset })
    }

    /// Consume one field record, returning its id and a sub-cursor over
    /// its body.
    pub fn field(&mut self, context: &'static str) -> Result<(u8, Cursor<'a>)> {
        let id = self.u8(context)?;
        let base = self.offset() + 4;
        let body = self.bytes(context)?;

        Ok((id, Cursor::sub(body, base)))
    }
}

/// Encoding half of the codec, in the manner of a buffer-building
/// serializer: implementors append their wire form to a byte vector.
pub trait Emit {
    /// Append the wire form of `self` to `buf`.
    fn emit(&self, buf: &mut Vec<u8>);

    /// Serialize into a fresh byte vector.
    fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        self.emit(&mut buf);

        buf
    }
}

/// Decoding half of the codec.
pub trait Parse: Sized {
    /// Read a value from the cursor, consuming exactly its wire form.
    fn parse(cur: &mut Cursor<'_>) -> Result<Self>;

    /// Decode a value from a standalone buffer.
    fn parse_all(buf: &[u8]) -> Result<Self> {
        Self::parse(&mut Cursor::new(buf))
    }
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, n: u32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, n: u64) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub(crate) fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, section_len(bytes.len()));
    buf.extend_from_slice(bytes);
}

pub(crate) fn put_text(buf: &mut Vec<u8>, text: &str) {
    put_bytes(buf, text.as_bytes());
}

/// Append one field record, producing the body through `body`.
///
/// # Panics
///
/// Panics if the produced body exceeds `u32::MAX` bytes; payload
/// sections are bounded by the frame size long before that.
pub(crate) fn put_field<F>(buf: &mut Vec<u8>, id: u8, body: F)
where
    F: FnOnce(&mut Vec<u8>),
{
    buf.push(id);

    let len_at = buf.len();
    put_u32(buf, 0);

    body(buf);

    let len = section_len(buf.len() - len_at - 4);
    buf[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
}

fn section_len(len: usize) -> u32 {
    u32::try_from(len).expect("payload section exceeds the u32 wire limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_in_order() {
        let mut buf = Vec::new();

        buf.push(7u8);
        put_u32(&mut buf, 0xdead_beef);
        put_u64(&mut buf, u64::MAX - 1);
        put_text(&mut buf, "gadget");

        let mut cur = Cursor::new(&buf);

        assert_eq!(cur.u8("tag").unwrap(), 7);
        assert_eq!(cur.u32("word").unwrap(), 0xdead_beef);
        assert_eq!(cur.u64("id").unwrap(), u64::MAX - 1);
        assert_eq!(cur.text("name").unwrap(), "gadget");
        assert!(cur.is_empty());
    }

    #[test]
    fn overrun_is_malformed_with_offset() {
        let mut cur = Cursor::new(&[1, 2, 3]);

        cur.take(2, "head").unwrap();

        match cur.take(2, "tail").unwrap_err() {
            Error::MalformedMessage { context, offset } => {
                assert_eq!(context, "tail");
                assert_eq!(offset, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn field_record_roundtrip() {
        let mut buf = Vec::new();

        put_field(&mut buf, 3, |b| put_u64(b, 42));

        let mut cur = Cursor::new(&buf);
        let (id, mut body) = cur.field("record").unwrap();

        assert_eq!(id, 3);
        assert_eq!(body.u64("value").unwrap(), 42);
        assert!(body.is_empty());
        assert!(cur.is_empty());
    }

    #[test]
    fn bad_utf8_is_invalid_encoding() {
        let mut buf = Vec::new();

        put_bytes(&mut buf, &[0xff, 0xfe]);

        let err = Cursor::new(&buf).text("label").unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InvalidEncoding);
    }

    #[test]
    fn field_length_outside_buffer_is_malformed() {
        // id 1, declared length 8, only 2 bytes present
        let buf = [1u8, 8, 0, 0, 0, 0xaa, 0xbb];
        let mut cur = Cursor::new(&buf);

        let err = cur.field("record").unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::MalformedMessage);
    }
}
