use crate::wire::{self, Cursor, Emit, Parse};
use crate::{Error, Result};

/// Open-ended extension record attached to headers, commands,
/// constraint systems and variable collections.
///
/// Exactly one payload kind is meaningful per key; which one is a
/// convention between sender and recipient, not enforced here.
/// Consumers must tolerate keys they do not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    /// Name of the parameter.
    pub key: String,
    /// Payload of the parameter.
    pub value: KvValue,
}

/// Payload of a [`KeyValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KvValue {
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Signed 64-bit number.
    Number(i64),
}

impl KeyValue {
    /// Create a bytes-valued record.
    pub fn bytes<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            key: key.into(),
            value: KvValue::Bytes(value.into()),
        }
    }

    /// Create a text-valued record.
    pub fn text<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: KvValue::Text(value.into()),
        }
    }

    /// Create a number-valued record.
    pub fn number<K>(key: K, value: i64) -> Self
    where
        K: Into<String>,
    {
        Self {
            key: key.into(),
            value: KvValue::Number(value),
        }
    }
}

const KIND_BYTES: u8 = 1;
const KIND_TEXT: u8 = 2;
const KIND_NUMBER: u8 = 3;

impl Emit for KeyValue {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_text(buf, &self.key);

        match &self.value {
            KvValue::Bytes(b) => {
                buf.push(KIND_BYTES);
                wire::put_bytes(buf, b);
            }
            KvValue::Text(t) => {
                buf.push(KIND_TEXT);
                wire::put_text(buf, t);
            }
            KvValue::Number(n) => {
                buf.push(KIND_NUMBER);
                wire::put_u64(buf, *n as u64);
            }
        }
    }
}

impl Parse for KeyValue {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let key = cur.text("key-value key")?;
        let kind = cur.u8("key-value kind")?;

        let value = match kind {
            KIND_BYTES => KvValue::Bytes(cur.bytes("key-value bytes")?.to_vec()),
            KIND_TEXT => KvValue::Text(cur.text("key-value text")?),
            KIND_NUMBER => KvValue::Number(cur.i64("key-value number")?),
            _ => {
                return Err(Error::MalformedMessage {
                    context: "unknown key-value payload kind",
                    offset: cur.offset(),
                })
            }
        };

        Ok(Self { key, value })
    }
}

/// Append a counted sequence of records.
pub(crate) fn emit_list(buf: &mut Vec<u8>, list: &[KeyValue]) {
    wire::put_u32(buf, list.len() as u32);

    for kv in list {
        kv.emit(buf);
    }
}

/// Read a counted sequence of records.
pub(crate) fn parse_list(cur: &mut Cursor<'_>) -> Result<Vec<KeyValue>> {
    let count = cur.u32("key-value count")? as usize;

    // one byte is the minimum footprint of a record; rejects counts
    // that could not possibly fit the remaining bytes
    if count > cur.remaining() {
        return Err(Error::MalformedMessage {
            context: "key-value count exceeds payload",
            offset: cur.offset(),
        });
    }

    let mut list = Vec::with_capacity(count);

    for _ in 0..count {
        list.push(KeyValue::parse(cur)?);
    }

    Ok(list)
}
