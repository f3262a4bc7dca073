use crate::header::ValueType;

/// Errors that can occur during frame encoding/decoding.
///
/// Every variant except [`FrameError::Io`] is connection-fatal: the byte
/// stream cannot be resynchronized once any of them has been observed.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carries a status code outside 100..=599.
    #[error("invalid status code {0} (expected 100..=599)")]
    InvalidStatus(u32),

    /// The declared frame length cannot even cover the frame header.
    #[error("frame length {length} is shorter than the {min}-byte frame header")]
    FrameTooShort { length: usize, min: usize },

    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A header entry would read past the declared header region.
    #[error("header 0x{id:04x} overruns header region ({needed} bytes needed, {remaining} remaining)")]
    HeaderOverrun {
        id: u16,
        needed: usize,
        remaining: usize,
    },

    /// A header entry carries a type tag this codec does not know.
    #[error("header 0x{id:04x} has unknown value type 0x{tag:02x}")]
    UnknownValueType { id: u16, tag: u8 },

    /// A string-typed header value is not valid UTF-8.
    #[error("header 0x{id:04x} string value is not valid UTF-8")]
    InvalidUtf8 { id: u16 },

    /// The same header id appears twice in one collection.
    #[error("duplicate header 0x{0:04x}")]
    DuplicateHeader(u16),

    /// A header value is too long for its length-prefixed wire type.
    #[error("header 0x{id:04x} value of {len} bytes does not fit {value_type:?}")]
    ValueTooLong {
        id: u16,
        len: usize,
        value_type: ValueType,
    },

    /// A known header was present but not with the value type the registry expects.
    #[error("header {name} has type {actual:?} (expected {expected:?})")]
    HeaderTypeMismatch {
        name: &'static str,
        expected: ValueType,
        actual: ValueType,
    },

    /// An encode/decode invariant failed, e.g. the declared frame length does
    /// not match the bytes actually written.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Returns true for structural wire errors produced while decoding.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidStatus(_)
                | FrameError::FrameTooShort { .. }
                | FrameError::FrameTooLarge { .. }
                | FrameError::PayloadTooLarge { .. }
                | FrameError::HeaderOverrun { .. }
                | FrameError::UnknownValueType { .. }
                | FrameError::InvalidUtf8 { .. }
                | FrameError::DuplicateHeader(_)
                | FrameError::HeaderTypeMismatch { .. }
        )
    }
}

/// Errors raised while projecting an envelope into a [`crate::ResponseRecord`].
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// A header the response record cannot be built without is absent.
    #[error("required header {0} is missing")]
    MissingHeader(&'static str),

    /// A header was present with the wrong value type.
    #[error(transparent)]
    Header(#[from] FrameError),

    /// The payload was declared as text but is not valid UTF-8.
    #[error("payload declared as text is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
