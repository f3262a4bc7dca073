//! Self-describing header collection that follows the frame header.
//!
//! Each entry is `{id: u16 LE, type tag: u8, value}`; the tag alone decides how
//! many bytes the value occupies, so decoding needs no schema. Known ids are
//! described once in the [`ResponseHeader`] registry, which also generates a
//! zero-sized key per header (see [`keys`]) for typed lookups.

use std::collections::HashMap;
use std::fmt;

use bytes::{BufMut, Bytes};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{FrameError, Result};

/// Entry prefix: id (2) + type tag (1).
pub const ENTRY_PREFIX_SIZE: usize = 3;

/// Wire type tags for header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ValueType {
    Byte = 0x00,
    UShort = 0x01,
    ULong = 0x02,
    Long = 0x03,
    ULongLong = 0x04,
    LongLong = 0x05,
    Guid = 0x06,
    SmallString = 0x07,
    String = 0x08,
    ULongString = 0x09,
    SmallBytes = 0x0A,
    Bytes = 0x0B,
    ULongBytes = 0x0C,
    Float = 0x0D,
    Double = 0x0E,
}

impl ValueType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        let value_type = match tag {
            0x00 => ValueType::Byte,
            0x01 => ValueType::UShort,
            0x02 => ValueType::ULong,
            0x03 => ValueType::Long,
            0x04 => ValueType::ULongLong,
            0x05 => ValueType::LongLong,
            0x06 => ValueType::Guid,
            0x07 => ValueType::SmallString,
            0x08 => ValueType::String,
            0x09 => ValueType::ULongString,
            0x0A => ValueType::SmallBytes,
            0x0B => ValueType::Bytes,
            0x0C => ValueType::ULongBytes,
            0x0D => ValueType::Float,
            0x0E => ValueType::Double,
            _ => return None,
        };
        Some(value_type)
    }

    /// Size of the length prefix for variable-length types, `None` for fixed ones.
    fn length_prefix(self) -> Option<usize> {
        match self {
            ValueType::SmallString | ValueType::SmallBytes => Some(1),
            ValueType::String | ValueType::Bytes => Some(2),
            ValueType::ULongString | ValueType::ULongBytes => Some(4),
            _ => None,
        }
    }

    fn max_len(self) -> usize {
        match self.length_prefix() {
            Some(1) => u8::MAX as usize,
            Some(2) => u16::MAX as usize,
            _ => u32::MAX as usize,
        }
    }
}

/// A decoded header value. The variant is the wire type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Byte(u8),
    UShort(u16),
    ULong(u32),
    Long(i32),
    ULongLong(u64),
    LongLong(i64),
    Guid(Uuid),
    SmallString(String),
    String(String),
    ULongString(String),
    SmallBytes(Bytes),
    Bytes(Bytes),
    ULongBytes(Bytes),
    Float(f32),
    Double(f64),
}

impl HeaderValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            HeaderValue::Byte(_) => ValueType::Byte,
            HeaderValue::UShort(_) => ValueType::UShort,
            HeaderValue::ULong(_) => ValueType::ULong,
            HeaderValue::Long(_) => ValueType::Long,
            HeaderValue::ULongLong(_) => ValueType::ULongLong,
            HeaderValue::LongLong(_) => ValueType::LongLong,
            HeaderValue::Guid(_) => ValueType::Guid,
            HeaderValue::SmallString(_) => ValueType::SmallString,
            HeaderValue::String(_) => ValueType::String,
            HeaderValue::ULongString(_) => ValueType::ULongString,
            HeaderValue::SmallBytes(_) => ValueType::SmallBytes,
            HeaderValue::Bytes(_) => ValueType::Bytes,
            HeaderValue::ULongBytes(_) => ValueType::ULongBytes,
            HeaderValue::Float(_) => ValueType::Float,
            HeaderValue::Double(_) => ValueType::Double,
        }
    }

    /// Encoded size of the value, length prefix included.
    pub fn encoded_len(&self) -> usize {
        match self {
            HeaderValue::Byte(_) => 1,
            HeaderValue::UShort(_) => 2,
            HeaderValue::ULong(_) | HeaderValue::Long(_) | HeaderValue::Float(_) => 4,
            HeaderValue::ULongLong(_) | HeaderValue::LongLong(_) | HeaderValue::Double(_) => 8,
            HeaderValue::Guid(_) => 16,
            HeaderValue::SmallString(s) => 1 + s.len(),
            HeaderValue::String(s) => 2 + s.len(),
            HeaderValue::ULongString(s) => 4 + s.len(),
            HeaderValue::SmallBytes(b) => 1 + b.len(),
            HeaderValue::Bytes(b) => 2 + b.len(),
            HeaderValue::ULongBytes(b) => 4 + b.len(),
        }
    }

    fn variable_len(&self) -> Option<usize> {
        match self {
            HeaderValue::SmallString(s) | HeaderValue::String(s) | HeaderValue::ULongString(s) => {
                Some(s.len())
            }
            HeaderValue::SmallBytes(b) | HeaderValue::Bytes(b) | HeaderValue::ULongBytes(b) => {
                Some(b.len())
            }
            _ => None,
        }
    }

    fn encode(&self, dst: &mut impl BufMut) {
        match self {
            HeaderValue::Byte(v) => dst.put_u8(*v),
            HeaderValue::UShort(v) => dst.put_u16_le(*v),
            HeaderValue::ULong(v) => dst.put_u32_le(*v),
            HeaderValue::Long(v) => dst.put_i32_le(*v),
            HeaderValue::ULongLong(v) => dst.put_u64_le(*v),
            HeaderValue::LongLong(v) => dst.put_i64_le(*v),
            HeaderValue::Guid(v) => dst.put_slice(&v.to_bytes_le()),
            HeaderValue::SmallString(s) => {
                dst.put_u8(s.len() as u8);
                dst.put_slice(s.as_bytes());
            }
            HeaderValue::String(s) => {
                dst.put_u16_le(s.len() as u16);
                dst.put_slice(s.as_bytes());
            }
            HeaderValue::ULongString(s) => {
                dst.put_u32_le(s.len() as u32);
                dst.put_slice(s.as_bytes());
            }
            HeaderValue::SmallBytes(b) => {
                dst.put_u8(b.len() as u8);
                dst.put_slice(b);
            }
            HeaderValue::Bytes(b) => {
                dst.put_u16_le(b.len() as u16);
                dst.put_slice(b);
            }
            HeaderValue::ULongBytes(b) => {
                dst.put_u32_le(b.len() as u32);
                dst.put_slice(b);
            }
            HeaderValue::Float(v) => dst.put_f32_le(*v),
            HeaderValue::Double(v) => dst.put_f64_le(*v),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Byte(v) => write!(f, "{v}"),
            HeaderValue::UShort(v) => write!(f, "{v}"),
            HeaderValue::ULong(v) => write!(f, "{v}"),
            HeaderValue::Long(v) => write!(f, "{v}"),
            HeaderValue::ULongLong(v) => write!(f, "{v}"),
            HeaderValue::LongLong(v) => write!(f, "{v}"),
            HeaderValue::Guid(v) => write!(f, "{v}"),
            HeaderValue::SmallString(s) | HeaderValue::String(s) | HeaderValue::ULongString(s) => {
                f.write_str(s)
            }
            HeaderValue::SmallBytes(b) | HeaderValue::Bytes(b) | HeaderValue::ULongBytes(b) => {
                f.write_str(&hex::encode(b))
            }
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Double(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for HeaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            HeaderValue::Byte(v) => serializer.serialize_u8(*v),
            HeaderValue::UShort(v) => serializer.serialize_u16(*v),
            HeaderValue::ULong(v) => serializer.serialize_u32(*v),
            HeaderValue::Long(v) => serializer.serialize_i32(*v),
            HeaderValue::ULongLong(v) => serializer.serialize_u64(*v),
            HeaderValue::LongLong(v) => serializer.serialize_i64(*v),
            HeaderValue::Float(v) => serializer.serialize_f32(*v),
            HeaderValue::Double(v) => serializer.serialize_f64(*v),
            other => serializer.collect_str(other),
        }
    }
}

/// Conversion from a wire-level value to the type a [`TypedHeader`] exposes.
pub trait FromWire<W>: Sized {
    fn from_wire(wire: &W) -> Self;
}

impl<T: Clone> FromWire<T> for T {
    fn from_wire(wire: &T) -> T {
        wire.clone()
    }
}

impl FromWire<u8> for bool {
    fn from_wire(wire: &u8) -> bool {
        *wire != 0
    }
}

/// A registry header with a statically known value type.
pub trait TypedHeader {
    const HEADER: ResponseHeader;
    type Value;

    /// Pull the typed value out, or `None` if the wire type does not match.
    fn extract(value: &HeaderValue) -> Option<Self::Value>;

    fn wrap(value: Self::Value) -> HeaderValue;
}

macro_rules! response_headers {
    ($(
        $(#[$doc:meta])*
        $name:ident = $id:literal, $variant:ident($wire:ty) => $ty:ty, $http:literal;
    )*) => {
        /// Response header ids known to this codec.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum ResponseHeader {
            $( $(#[$doc])* $name = $id, )*
        }

        impl ResponseHeader {
            pub const ALL: &'static [ResponseHeader] = &[$(ResponseHeader::$name,)*];

            pub fn id(self) -> u16 {
                self as u16
            }

            pub fn from_id(id: u16) -> Option<Self> {
                match id {
                    $( $id => Some(ResponseHeader::$name), )*
                    _ => None,
                }
            }

            /// The value type this header is expected to carry.
            pub fn value_type(self) -> ValueType {
                match self {
                    $( ResponseHeader::$name => ValueType::$variant, )*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( ResponseHeader::$name => stringify!($name), )*
                }
            }

            /// Header name used when the response is surfaced as HTTP-style metadata.
            pub fn http_name(self) -> &'static str {
                match self {
                    $( ResponseHeader::$name => $http, )*
                }
            }
        }

        /// Zero-sized typed keys, one per [`ResponseHeader`].
        pub mod keys {
            use super::*;

            $(
                $(#[$doc])*
                #[derive(Debug, Clone, Copy)]
                pub struct $name;

                impl TypedHeader for $name {
                    const HEADER: ResponseHeader = ResponseHeader::$name;
                    type Value = $ty;

                    fn extract(value: &HeaderValue) -> Option<$ty> {
                        match value {
                            HeaderValue::$variant(wire) => {
                                Some(<$ty as FromWire<$wire>>::from_wire(wire))
                            }
                            _ => None,
                        }
                    }

                    fn wrap(value: $ty) -> HeaderValue {
                        HeaderValue::$variant(<$wire>::from(value))
                    }
                }
            )*
        }
    };
}

response_headers! {
    /// Set when a length-prefixed payload follows the header collection.
    PayloadPresent = 0x0000, Byte(u8) => bool, "x-ms-payload-present";
    LastStateChangeDateTime = 0x0002, SmallString(String) => String, "x-ms-last-state-change-utc";
    ContinuationToken = 0x0003, String(String) => String, "x-ms-continuation";
    ETag = 0x0004, String(String) => String, "etag";
    RetryAfterMilliseconds = 0x000C, ULong(u32) => u32, "x-ms-retry-after-ms";
    SchemaVersion = 0x0010, SmallString(String) => String, "x-ms-schemaversion";
    /// Log sequence number of the replica that served the request.
    Lsn = 0x0013, LongLong(i64) => i64, "lsn";
    ItemCount = 0x0014, ULong(u32) => u32, "x-ms-item-count";
    RequestCharge = 0x0015, Double(f64) => f64, "x-ms-request-charge";
    OwnerFullName = 0x0017, String(String) => String, "x-ms-alt-content-path";
    OwnerId = 0x0018, String(String) => String, "x-ms-content-path";
    QuorumAckedLsn = 0x001A, LongLong(i64) => i64, "x-ms-quorum-acked-lsn";
    SubStatus = 0x001C, ULong(u32) => u32, "x-ms-substatus";
    CurrentWriteQuorum = 0x001E, ULong(u32) => u32, "x-ms-current-write-quorum";
    CurrentReplicaSetSize = 0x001F, ULong(u32) => u32, "x-ms-current-replica-set-size";
    PartitionKeyRangeId = 0x0021, String(String) => String, "x-ms-documentdb-partitionkeyrangeid";
    GlobalCommittedLsn = 0x0029, LongLong(i64) => i64, "x-ms-global-committed-lsn";
    ItemLsn = 0x0032, LongLong(i64) => i64, "x-ms-item-lsn";
    /// Echo of the request's transport-level sequence number.
    TransportRequestId = 0x0035, ULong(u32) => u32, "x-ms-transport-request-id";
    ServerDateTimeUtc = 0x0039, SmallString(String) => String, "x-ms-date";
    LocalLsn = 0x003A, LongLong(i64) => i64, "x-ms-cosmos-llsn";
    SessionToken = 0x003E, String(String) => String, "x-ms-session-token";
    /// 0 for JSON text payloads, anything else for binary.
    ContentSerializationFormat = 0x0045, Byte(u8) => u8, "x-ms-documentdb-content-serialization-format";
}

impl ResponseHeader {
    /// Look up a header by registry name or HTTP name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|header| {
            header.name().eq_ignore_ascii_case(name) || header.http_name().eq_ignore_ascii_case(name)
        })
    }
}

/// One entry of a [`HeaderCollection`], borrowed in wire order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderEntry<'a> {
    pub id: u16,
    pub value: &'a HeaderValue,
}

impl HeaderEntry<'_> {
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Registry entry for this id, `None` for ids this codec does not know.
    pub fn known(&self) -> Option<ResponseHeader> {
        ResponseHeader::from_id(self.id)
    }
}

/// Uniquely keyed header set that remembers wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderCollection {
    values: HashMap<u16, HeaderValue>,
    order: Vec<u16>,
}

impl HeaderCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert or replace a value by raw id. Replacing keeps the original position.
    pub fn insert(&mut self, id: u16, value: HeaderValue) -> Option<HeaderValue> {
        let previous = self.values.insert(id, value);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Insert a typed registry header.
    pub fn set<H: TypedHeader>(&mut self, value: H::Value) -> Option<HeaderValue> {
        self.insert(H::HEADER.id(), H::wrap(value))
    }

    /// Remove an entry by raw id.
    pub fn remove(&mut self, id: u16) -> Option<HeaderValue> {
        let removed = self.values.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    /// Returns true if an entry with this id is present.
    pub fn contains(&self, id: u16) -> bool {
        self.values.contains_key(&id)
    }

    /// Raw lookup by id, for known and unknown ids alike.
    pub fn get_raw(&self, id: u16) -> Option<&HeaderValue> {
        self.values.get(&id)
    }

    /// Typed lookup.
    ///
    /// Returns `Ok(None)` if the header is absent and
    /// [`FrameError::HeaderTypeMismatch`] if it carries the wrong wire type.
    pub fn get<H: TypedHeader>(&self) -> Result<Option<H::Value>> {
        let Some(value) = self.values.get(&H::HEADER.id()) else {
            return Ok(None);
        };
        match H::extract(value) {
            Some(typed) => Ok(Some(typed)),
            None => Err(FrameError::HeaderTypeMismatch {
                name: H::HEADER.name(),
                expected: H::HEADER.value_type(),
                actual: value.value_type(),
            }),
        }
    }

    /// Whether a payload region follows on the wire.
    pub fn payload_present(&self) -> bool {
        matches!(
            self.values.get(&ResponseHeader::PayloadPresent.id()),
            Some(HeaderValue::Byte(flag)) if *flag != 0
        )
    }

    /// Entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = HeaderEntry<'_>> + '_ {
        self.order.iter().filter_map(|id| {
            self.values
                .get(id)
                .map(|value| HeaderEntry { id: *id, value })
        })
    }

    /// Number of bytes [`HeaderCollection::encode`] will write.
    pub fn encoded_len(&self) -> usize {
        self.values
            .values()
            .map(|value| ENTRY_PREFIX_SIZE + value.encoded_len())
            .sum()
    }

    /// Encode every entry in wire order. Returns the number of bytes written.
    ///
    /// Nothing is written if any value is too long for its wire type.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<usize> {
        for entry in self.iter() {
            if let Some(len) = entry.value.variable_len() {
                let value_type = entry.value_type();
                if len > value_type.max_len() {
                    return Err(FrameError::ValueTooLong {
                        id: entry.id,
                        len,
                        value_type,
                    });
                }
            }
        }

        let mut written = 0;
        for entry in self.iter() {
            dst.put_u16_le(entry.id);
            dst.put_u8(entry.value_type().tag());
            entry.value.encode(dst);
            written += ENTRY_PREFIX_SIZE + entry.value.encoded_len();
        }
        Ok(written)
    }

    /// Decode exactly `declared_len` bytes of header entries from the front of `src`.
    pub fn decode(src: &[u8], declared_len: usize) -> Result<Self> {
        let Some(region) = src.get(..declared_len) else {
            return Err(FrameError::ConsistencyViolation(format!(
                "header region declares {declared_len} bytes but only {} were supplied",
                src.len()
            )));
        };

        let mut headers = HeaderCollection::new();
        let mut rest = region;

        while !rest.is_empty() {
            let [lo, hi, tag, tail @ ..] = rest else {
                // Only report an id when both of its bytes arrived.
                let id = match rest {
                    [lo, hi] => u16::from_le_bytes([*lo, *hi]),
                    _ => 0,
                };
                return Err(FrameError::HeaderOverrun {
                    id,
                    needed: ENTRY_PREFIX_SIZE,
                    remaining: rest.len(),
                });
            };
            let id = u16::from_le_bytes([*lo, *hi]);
            let tag = *tag;
            rest = tail;

            let value_type =
                ValueType::from_tag(tag).ok_or(FrameError::UnknownValueType { id, tag })?;
            // Payload framing depends on this entry, so its type is enforced here.
            let reserved = ResponseHeader::PayloadPresent;
            if id == reserved.id() && value_type != reserved.value_type() {
                return Err(FrameError::HeaderTypeMismatch {
                    name: reserved.name(),
                    expected: reserved.value_type(),
                    actual: value_type,
                });
            }
            let (value, used) = decode_value(id, value_type, rest)?;
            rest = &rest[used..];

            if ResponseHeader::from_id(id).is_none() {
                tracing::debug!(id, ?value_type, "retaining unknown header");
            }
            if headers.insert(id, value).is_some() {
                return Err(FrameError::DuplicateHeader(id));
            }
        }

        Ok(headers)
    }
}

impl Serialize for HeaderCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for entry in self.iter() {
            match entry.known() {
                Some(header) => map.serialize_entry(header.name(), entry.value)?,
                None => map.serialize_entry(&format!("0x{:04x}", entry.id), entry.value)?,
            }
        }
        map.end()
    }
}

fn take<'a>(src: &'a [u8], n: usize, id: u16) -> Result<&'a [u8]> {
    src.get(..n).ok_or(FrameError::HeaderOverrun {
        id,
        needed: n,
        remaining: src.len(),
    })
}

fn fixed<const N: usize>(src: &[u8], id: u16) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(src, N, id)?);
    Ok(out)
}

/// Decode one value; returns it with the number of bytes it occupied.
fn decode_value(id: u16, value_type: ValueType, src: &[u8]) -> Result<(HeaderValue, usize)> {
    if let Some(prefix) = value_type.length_prefix() {
        let len = match prefix {
            1 => usize::from(fixed::<1>(src, id)?[0]),
            2 => usize::from(u16::from_le_bytes(fixed::<2>(src, id)?)),
            _ => u32::from_le_bytes(fixed::<4>(src, id)?) as usize,
        };
        let body = take(&src[prefix..], len, id).map_err(|_| FrameError::HeaderOverrun {
            id,
            needed: prefix.saturating_add(len),
            remaining: src.len(),
        })?;
        let used = prefix + len;

        let value = match value_type {
            ValueType::SmallString => HeaderValue::SmallString(utf8(body, id)?),
            ValueType::String => HeaderValue::String(utf8(body, id)?),
            ValueType::ULongString => HeaderValue::ULongString(utf8(body, id)?),
            ValueType::SmallBytes => HeaderValue::SmallBytes(Bytes::copy_from_slice(body)),
            ValueType::Bytes => HeaderValue::Bytes(Bytes::copy_from_slice(body)),
            _ => HeaderValue::ULongBytes(Bytes::copy_from_slice(body)),
        };
        return Ok((value, used));
    }

    let value = match value_type {
        ValueType::Byte => HeaderValue::Byte(fixed::<1>(src, id)?[0]),
        ValueType::UShort => HeaderValue::UShort(u16::from_le_bytes(fixed(src, id)?)),
        ValueType::ULong => HeaderValue::ULong(u32::from_le_bytes(fixed(src, id)?)),
        ValueType::Long => HeaderValue::Long(i32::from_le_bytes(fixed(src, id)?)),
        ValueType::ULongLong => HeaderValue::ULongLong(u64::from_le_bytes(fixed(src, id)?)),
        ValueType::LongLong => HeaderValue::LongLong(i64::from_le_bytes(fixed(src, id)?)),
        ValueType::Guid => HeaderValue::Guid(Uuid::from_bytes_le(fixed(src, id)?)),
        ValueType::Float => HeaderValue::Float(f32::from_le_bytes(fixed(src, id)?)),
        _ => HeaderValue::Double(f64::from_le_bytes(fixed(src, id)?)),
    };
    let used = value.encoded_len();
    Ok((value, used))
}

fn utf8(body: &[u8], id: u16) -> Result<String> {
    std::str::from_utf8(body)
        .map(str::to_owned)
        .map_err(|_| FrameError::InvalidUtf8 { id })
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn encoded(headers: &HeaderCollection) -> BytesMut {
        let mut buf = BytesMut::new();
        let written = headers.encode(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(written, headers.encoded_len());
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip_all_value_types() {
        let mut headers = HeaderCollection::new();
        headers.insert(0x1000, HeaderValue::Byte(7));
        headers.insert(0x1001, HeaderValue::UShort(0xBEEF));
        headers.insert(0x1002, HeaderValue::ULong(42));
        headers.insert(0x1003, HeaderValue::Long(-42));
        headers.insert(0x1004, HeaderValue::ULongLong(u64::MAX));
        headers.insert(0x1005, HeaderValue::LongLong(i64::MIN));
        headers.insert(0x1006, HeaderValue::Guid(Uuid::from_u128(99)));
        headers.insert(0x1007, HeaderValue::SmallString("small".into()));
        headers.insert(0x1008, HeaderValue::String("medium".into()));
        headers.insert(0x1009, HeaderValue::ULongString("large".into()));
        headers.insert(0x100A, HeaderValue::SmallBytes(Bytes::from_static(b"\x01")));
        headers.insert(0x100B, HeaderValue::Bytes(Bytes::from_static(b"\x01\x02")));
        headers.insert(0x100C, HeaderValue::ULongBytes(Bytes::from_static(b"\x01\x02\x03")));
        headers.insert(0x100D, HeaderValue::Float(1.5));
        headers.insert(0x100E, HeaderValue::Double(-2.25));

        let buf = encoded(&headers);
        let decoded = HeaderCollection::decode(&buf, buf.len()).unwrap();

        assert_eq!(decoded, headers);
        let ids: Vec<u16> = decoded.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, (0x1000..=0x100E).collect::<Vec<u16>>());
    }

    #[test]
    fn test_transport_request_id_wire_shape() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(42);

        let buf = encoded(&headers);
        assert_eq!(&buf[..], &[0x35, 0x00, 0x02, 42, 0, 0, 0]);
    }

    #[test]
    fn test_typed_lookup() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(42);
        headers.set::<keys::SessionToken>("0:1#99".to_string());
        headers.set::<keys::PayloadPresent>(true);
        headers.set::<keys::RequestCharge>(2.5);

        assert_eq!(headers.get::<keys::TransportRequestId>().unwrap(), Some(42));
        assert_eq!(
            headers.get::<keys::SessionToken>().unwrap().as_deref(),
            Some("0:1#99")
        );
        assert_eq!(headers.get::<keys::PayloadPresent>().unwrap(), Some(true));
        assert_eq!(headers.get::<keys::RequestCharge>().unwrap(), Some(2.5));
        assert_eq!(headers.get::<keys::SubStatus>().unwrap(), None);
        assert!(headers.payload_present());
    }

    #[test]
    fn test_typed_lookup_rejects_wrong_wire_type() {
        let mut headers = HeaderCollection::new();
        headers.insert(
            ResponseHeader::TransportRequestId.id(),
            HeaderValue::String("42".into()),
        );

        let err = headers.get::<keys::TransportRequestId>().unwrap_err();
        assert!(matches!(
            err,
            FrameError::HeaderTypeMismatch {
                expected: ValueType::ULong,
                actual: ValueType::String,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_present_absent_or_zero() {
        let mut headers = HeaderCollection::new();
        assert!(!headers.payload_present());
        headers.set::<keys::PayloadPresent>(false);
        assert!(!headers.payload_present());
    }

    #[test]
    fn test_unknown_header_is_retained() {
        let mut headers = HeaderCollection::new();
        headers.insert(0x7777, HeaderValue::ULong(5));
        let buf = encoded(&headers);

        let decoded = HeaderCollection::decode(&buf, buf.len()).unwrap();
        assert_eq!(decoded.get_raw(0x7777), Some(&HeaderValue::ULong(5)));
        let entry = decoded.iter().next().unwrap();
        assert_eq!(entry.known(), None);
    }

    #[test]
    fn test_value_length_overruns_declared_region() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::SessionToken>("abcdef".to_string());
        let buf = encoded(&headers);

        // Entry claims 6 bytes of string but the region is cut two bytes short.
        let err = HeaderCollection::decode(&buf, buf.len() - 2).unwrap_err();
        assert!(matches!(
            err,
            FrameError::HeaderOverrun {
                id: 0x003E,
                needed: 8,
                remaining: 6,
            }
        ));
    }

    #[test]
    fn test_fixed_value_overrun() {
        let buf = [0x35, 0x00, 0x02, 0x01, 0x02];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(err, FrameError::HeaderOverrun { id: 0x0035, .. }));
    }

    #[test]
    fn test_truncated_entry_prefix() {
        let buf = [0x35, 0x00];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::HeaderOverrun {
                needed: ENTRY_PREFIX_SIZE,
                remaining: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_single_byte_prefix_reports_no_id() {
        let buf = [0x35];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::HeaderOverrun {
                id: 0,
                remaining: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_mistyped_payload_present_is_rejected() {
        // PayloadPresent carried as ULong 1.
        let buf = [0x00, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::HeaderTypeMismatch {
                expected: ValueType::Byte,
                actual: ValueType::ULong,
                ..
            }
        ));
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_unknown_value_type() {
        let buf = [0x01, 0x00, 0x7F, 0x00];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(err, FrameError::UnknownValueType { id: 1, tag: 0x7F }));
    }

    #[test]
    fn test_invalid_utf8() {
        let buf = [0x3E, 0x00, 0x07, 0x02, 0xFF, 0xFE];
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidUtf8 { id: 0x003E }));
    }

    #[test]
    fn test_duplicate_header() {
        let entry = [0x35, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00];
        let buf = [entry, entry].concat();
        let err = HeaderCollection::decode(&buf, buf.len()).unwrap_err();
        assert!(matches!(err, FrameError::DuplicateHeader(0x0035)));
    }

    #[test]
    fn test_decode_ignores_bytes_past_declared_length() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::ItemCount>(3);
        let mut buf = encoded(&headers);
        let declared = buf.len();
        buf.put_slice(b"next frame");

        let decoded = HeaderCollection::decode(&buf, declared).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_encode_rejects_oversized_small_string() {
        let mut headers = HeaderCollection::new();
        headers.insert(
            ResponseHeader::SchemaVersion.id(),
            HeaderValue::SmallString("x".repeat(300)),
        );

        let mut buf = BytesMut::new();
        let err = headers.encode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ValueTooLong { len: 300, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_replace_keeps_wire_position() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::ItemCount>(1);
        headers.set::<keys::SubStatus>(2);
        headers.set::<keys::ItemCount>(3);

        let ids: Vec<u16> = headers.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![0x0014, 0x001C]);
        assert_eq!(headers.get::<keys::ItemCount>().unwrap(), Some(3));

        headers.remove(0x0014);
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains(0x0014));
    }

    #[test]
    fn test_registry_is_consistent() {
        for header in ResponseHeader::ALL {
            assert_eq!(ResponseHeader::from_id(header.id()), Some(*header));
            assert!(!header.http_name().is_empty());
        }
        assert_eq!(ResponseHeader::TransportRequestId.id(), 0x0035);
        assert_eq!(
            ResponseHeader::PayloadPresent.value_type(),
            ValueType::Byte
        );
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(
            ResponseHeader::from_name("SessionToken"),
            Some(ResponseHeader::SessionToken)
        );
        assert_eq!(
            ResponseHeader::from_name("X-MS-Request-Charge"),
            Some(ResponseHeader::RequestCharge)
        );
        assert_eq!(ResponseHeader::from_name("x-unknown"), None);
    }

    #[test]
    fn test_serialize_uses_registry_names() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(42);
        headers.insert(0x7777, HeaderValue::Bytes(Bytes::from_static(b"\xAB")));

        let json = serde_json::to_value(&headers).unwrap();
        assert_eq!(json["TransportRequestId"], 42);
        assert_eq!(json["0x7777"], "ab");
    }
}
