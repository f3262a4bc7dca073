//! Reference-counted message envelope.
//!
//! An [`Envelope`] value *is* one reference. [`Envelope::retain`] hands out a
//! second handle, [`Envelope::release`] consumes a handle, and dropping a handle
//! releases it implicitly. The backing bytes are returned to the configured
//! [`BufferPool`] exactly once, when the last handle goes away. Because every
//! accessor borrows a live handle, nothing can read the buffer after release.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use uuid::Uuid;

use crate::assemble::{assemble, ContextMetadata, ResponseRecord};
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result, TranslateError};
use crate::framer::{peek_payload_len, try_frame, Decoded, PAYLOAD_LENGTH_SIZE};
use crate::header::{keys, HeaderCollection, HeaderValue, TypedHeader};
use crate::status::{
    decode_frame_header, encode_frame_header, is_valid_status, FrameHeader, FRAME_HEADER_SIZE,
};

/// Destination for an envelope's backing bytes once the last reference is released.
pub trait BufferPool: fmt::Debug + Send + Sync {
    /// Called exactly once per envelope, with the byte range the envelope owned.
    fn reclaim(&self, buf: Bytes);
}

/// A pool that only counts what it is handed back.
#[derive(Debug, Default)]
pub struct CountingPool {
    reclaims: AtomicUsize,
    bytes: AtomicUsize,
}

impl CountingPool {
    /// Create a pool with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of envelopes whose buffers were reclaimed.
    pub fn reclaims(&self) -> usize {
        self.reclaims.load(Ordering::Acquire)
    }

    /// Total bytes handed back across all reclaims.
    pub fn reclaimed_bytes(&self) -> usize {
        self.bytes.load(Ordering::Acquire)
    }
}

impl BufferPool for CountingPool {
    fn reclaim(&self, buf: Bytes) {
        self.bytes.fetch_add(buf.len(), Ordering::AcqRel);
        self.reclaims.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
struct Inner {
    frame: FrameHeader,
    headers: HeaderCollection,
    /// Every byte this envelope owns. `payload` is a view into it.
    backing: Bytes,
    payload: Bytes,
    message_length: usize,
    pool: Option<Arc<dyn BufferPool>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.payload = Bytes::new();
        let backing = std::mem::take(&mut self.backing);
        tracing::trace!(
            correlation_id = %self.frame.correlation_id,
            bytes = backing.len(),
            "envelope released"
        );
        if let Some(pool) = self.pool.take() {
            pool.reclaim(backing);
        }
    }
}

/// One decoded (or locally constructed) response message.
#[derive(Debug)]
pub struct Envelope {
    inner: Arc<Inner>,
}

impl Envelope {
    /// Build an outbound envelope from structured fields.
    ///
    /// The payload-presence header is set from `payload` and overrides any
    /// value already in `headers`. The returned handle is the sole owner.
    pub fn new(
        correlation_id: Uuid,
        status: u32,
        headers: HeaderCollection,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        Self::build(correlation_id, status, headers, payload.into(), None)
    }

    /// Like [`Envelope::new`], returning the payload to `pool` on final release.
    pub fn new_pooled(
        correlation_id: Uuid,
        status: u32,
        headers: HeaderCollection,
        payload: impl Into<Bytes>,
        pool: Arc<dyn BufferPool>,
    ) -> Result<Self> {
        Self::build(correlation_id, status, headers, payload.into(), Some(pool))
    }

    fn build(
        correlation_id: Uuid,
        status: u32,
        mut headers: HeaderCollection,
        payload: Bytes,
        pool: Option<Arc<dyn BufferPool>>,
    ) -> Result<Self> {
        if !is_valid_status(status) {
            return Err(FrameError::InvalidStatus(status));
        }
        if payload.len() > u32::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: u32::MAX as usize,
            });
        }
        headers.set::<keys::PayloadPresent>(!payload.is_empty());

        let length = FRAME_HEADER_SIZE + headers.encoded_len();
        let length = u32::try_from(length).map_err(|_| FrameError::FrameTooLarge {
            size: length,
            max: u32::MAX as usize,
        })?;
        let frame = FrameHeader {
            length,
            status,
            correlation_id,
        };

        Ok(Self::from_parts(frame, headers, payload.clone(), payload, pool))
    }

    fn from_parts(
        frame: FrameHeader,
        headers: HeaderCollection,
        backing: Bytes,
        payload: Bytes,
        pool: Option<Arc<dyn BufferPool>>,
    ) -> Self {
        let payload_region = if headers.payload_present() {
            PAYLOAD_LENGTH_SIZE + payload.len()
        } else {
            0
        };
        let message_length = frame.length as usize + payload_region;
        Self {
            inner: Arc::new(Inner {
                frame,
                headers,
                backing,
                payload,
                message_length,
                pool,
            }),
        }
    }

    /// Decode one envelope from the front of `src`.
    ///
    /// On `NeedMoreData` nothing is consumed and the call can simply be
    /// repeated once more bytes have been appended. On success exactly the
    /// envelope's bytes are split off `src` and owned by the returned handle.
    /// Errors are connection-fatal.
    pub fn decode(src: &mut BytesMut, config: &FrameConfig) -> Result<Decoded<Envelope>> {
        let frame = match decode_frame_header(&src[..])? {
            Decoded::Complete(frame) => frame,
            Decoded::NeedMoreData => {
                tracing::trace!(buffered = src.len(), "need more data for frame header");
                return Ok(Decoded::NeedMoreData);
            }
        };

        let length = frame.length as usize;
        if length > config.max_frame_length {
            return Err(FrameError::FrameTooLarge {
                size: length,
                max: config.max_frame_length,
            });
        }
        if src.len() < length {
            tracing::trace!(buffered = src.len(), length, "need more data for headers");
            return Ok(Decoded::NeedMoreData);
        }

        let headers = HeaderCollection::decode(&src[FRAME_HEADER_SIZE..], frame.headers_length())?;
        let payload_expected = headers.payload_present();

        if payload_expected {
            if let Some(size) = peek_payload_len(&src[length..]) {
                if size > config.max_payload_size {
                    return Err(FrameError::PayloadTooLarge {
                        size,
                        max: config.max_payload_size,
                    });
                }
            }
        }

        let (payload_len, payload_wire_len) = match try_frame(&src[length..], payload_expected) {
            Decoded::Complete(framed) => (framed.bytes.len(), framed.wire_len),
            Decoded::NeedMoreData => {
                tracing::trace!(buffered = src.len(), length, "need more data for payload");
                return Ok(Decoded::NeedMoreData);
            }
        };

        let total = length + payload_wire_len;
        let backing = src.split_to(total).freeze();
        let payload = backing.slice(total - payload_len..total);

        tracing::debug!(
            correlation_id = %frame.correlation_id,
            status = frame.status,
            headers = headers.len(),
            payload = payload_len,
            "decoded envelope"
        );

        Ok(Decoded::Complete(Self::from_parts(
            frame,
            headers,
            backing,
            payload,
            config.pool.clone(),
        )))
    }

    /// Serialize this envelope back to wire form.
    ///
    /// The frame header and header collection must come out at exactly the
    /// declared frame length; anything else is a [`FrameError::ConsistencyViolation`]
    /// and `dst` is left as it was.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let inner = &*self.inner;
        let start = dst.len();

        let encoded = encode_frame_header(
            inner.frame.status,
            inner.frame.correlation_id,
            inner.frame.length,
            dst,
        )
        .and_then(|()| inner.headers.encode(dst));
        if let Err(err) = encoded {
            dst.truncate(start);
            return Err(err);
        }

        let written = dst.len() - start;
        if written != inner.frame.length as usize {
            dst.truncate(start);
            tracing::error!(
                correlation_id = %inner.frame.correlation_id,
                declared = inner.frame.length,
                written,
                "encoded frame length does not match declared length"
            );
            return Err(FrameError::ConsistencyViolation(format!(
                "declared frame length {} but encoded {written} bytes",
                inner.frame.length
            )));
        }

        if inner.headers.payload_present() {
            dst.reserve(PAYLOAD_LENGTH_SIZE + inner.payload.len());
            dst.put_u32_le(inner.payload.len() as u32);
            dst.put_slice(&inner.payload);
        } else if !inner.payload.is_empty() {
            dst.truncate(start);
            tracing::error!(
                correlation_id = %inner.frame.correlation_id,
                payload = inner.payload.len(),
                "payload present without payload-presence header"
            );
            return Err(FrameError::ConsistencyViolation(format!(
                "{} payload bytes without payload-presence header",
                inner.payload.len()
            )));
        }

        Ok(())
    }

    /// Take an additional reference.
    pub fn retain(&self) -> Envelope {
        Envelope {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give up this reference.
    ///
    /// Returns true if this call released the last reference, in which case
    /// the backing bytes have been returned to the pool.
    pub fn release(self) -> bool {
        match Arc::into_inner(self.inner) {
            Some(inner) => {
                drop(inner);
                true
            }
            None => false,
        }
    }

    /// Number of live references, this one included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Detach the payload without copying.
    ///
    /// Only possible while this is the last reference; otherwise the envelope
    /// is handed back untouched. A detached buffer belongs to the caller and
    /// is never handed to the pool.
    pub fn into_payload(self) -> std::result::Result<Bytes, Envelope> {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.pool = None;
                Ok(std::mem::take(&mut inner.payload))
            }
            Err(inner) => Err(Envelope { inner }),
        }
    }

    /// The decoded (or computed) frame header.
    pub fn frame(&self) -> &FrameHeader {
        &self.inner.frame
    }

    pub fn correlation_id(&self) -> Uuid {
        self.inner.frame.correlation_id
    }

    pub fn status(&self) -> u32 {
        self.inner.frame.status
    }

    /// All headers, unknown ids included.
    pub fn headers(&self) -> &HeaderCollection {
        &self.inner.headers
    }

    /// Typed header lookup, see [`HeaderCollection::get`].
    pub fn header<H: TypedHeader>(&self) -> Result<Option<H::Value>> {
        self.inner.headers.get::<H>()
    }

    /// Raw lookup by id.
    pub fn header_raw(&self, id: u16) -> Option<&HeaderValue> {
        self.inner.headers.get_raw(id)
    }

    pub fn transport_request_id(&self) -> Result<Option<u32>> {
        self.header::<keys::TransportRequestId>()
    }

    pub fn has_payload(&self) -> bool {
        self.inner.headers.payload_present()
    }

    /// Payload bytes, empty when no payload region was sent.
    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    /// Total wire size: frame header, headers and payload region.
    pub fn message_length(&self) -> usize {
        self.inner.message_length
    }

    /// Project into an owned record that outlives this envelope.
    pub fn to_result(
        &self,
        context: &ContextMetadata,
    ) -> std::result::Result<ResponseRecord, TranslateError> {
        assemble(self, context)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeView<'a> {
    message_length: usize,
    reference_count: usize,
    frame: &'a FrameHeader,
    headers: &'a HeaderCollection,
    content: ContentView<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentView<'a> {
    length_in_bytes: usize,
    hex_dump: String,
    string: Cow<'a, str>,
}

impl Serialize for Envelope {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let payload = self.payload();
        EnvelopeView {
            message_length: self.message_length(),
            reference_count: self.ref_count(),
            frame: self.frame(),
            headers: self.headers(),
            content: ContentView {
                length_in_bytes: payload.len(),
                hex_dump: hex::encode(payload),
                string: String::from_utf8_lossy(payload),
            },
        }
        .serialize(serializer)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
