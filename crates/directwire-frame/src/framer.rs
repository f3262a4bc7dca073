//! Non-destructive payload framing.
//!
//! Socket reads never line up with message boundaries, so every check here
//! works on a borrowed slice and reports [`Decoded::NeedMoreData`] instead of
//! consuming anything. The caller appends the next chunk and asks again.

/// Size of the little-endian payload length prefix.
pub const PAYLOAD_LENGTH_SIZE: usize = 4;

/// Outcome of a decode attempt against a buffer that may hold a partial frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A complete value was available.
    Complete(T),
    /// The buffer does not hold enough bytes yet. Nothing was consumed.
    NeedMoreData,
}

impl<T> Decoded<T> {
    /// Convert into an `Option`, mapping `NeedMoreData` to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Decoded::Complete(value) => Some(value),
            Decoded::NeedMoreData => None,
        }
    }

    /// Returns true if a value was produced.
    pub fn is_complete(&self) -> bool {
        matches!(self, Decoded::Complete(_))
    }

    /// Transform the decoded value, keeping `NeedMoreData` as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Complete(value) => Decoded::Complete(f(value)),
            Decoded::NeedMoreData => Decoded::NeedMoreData,
        }
    }
}

/// A payload located inside a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedPayload<'a> {
    /// Payload bytes, without the length prefix.
    pub bytes: &'a [u8],
    /// Bytes the payload region occupies on the wire, prefix included.
    pub wire_len: usize,
}

const EMPTY_PAYLOAD: FramedPayload<'static> = FramedPayload {
    bytes: &[],
    wire_len: 0,
};

/// Check whether `buf` starts with a complete length-prefixed payload.
///
/// When `payload_expected` is false the payload region is absent on the wire
/// and an empty payload is returned without looking at `buf`.
pub fn try_frame(buf: &[u8], payload_expected: bool) -> Decoded<FramedPayload<'_>> {
    if !payload_expected {
        return Decoded::Complete(EMPTY_PAYLOAD);
    }

    let Some(len) = peek_payload_len(buf) else {
        return Decoded::NeedMoreData;
    };

    let wire_len = PAYLOAD_LENGTH_SIZE.saturating_add(len);
    match buf.get(PAYLOAD_LENGTH_SIZE..wire_len) {
        Some(bytes) => Decoded::Complete(FramedPayload { bytes, wire_len }),
        None => Decoded::NeedMoreData,
    }
}

/// Peek at the declared payload length without requiring the payload itself.
pub fn peek_payload_len(buf: &[u8]) -> Option<usize> {
    let prefix = buf.get(..PAYLOAD_LENGTH_SIZE)?;
    let mut len = [0u8; PAYLOAD_LENGTH_SIZE];
    len.copy_from_slice(prefix);
    Some(u32::from_le_bytes(len) as usize)
}
