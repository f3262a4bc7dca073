use bytes::BufMut;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{FrameError, Result};
use crate::framer::Decoded;

/// Frame header: length (4) + status (4) + correlation id (16) = 24 bytes.
pub const FRAME_HEADER_SIZE: usize = 24;

/// Lowest status code accepted on the wire.
pub const MIN_STATUS: u32 = 100;

/// Highest status code accepted on the wire.
pub const MAX_STATUS: u32 = 599;

/// The fixed-size preamble of every response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameHeader {
    /// Bytes covered by the frame header plus the header collection.
    pub length: u32,
    /// Numeric response status.
    pub status: u32,
    /// Identifier echoed from the request.
    pub correlation_id: Uuid,
}

impl FrameHeader {
    /// Length of the header collection that follows this frame header.
    pub fn headers_length(&self) -> usize {
        (self.length as usize).saturating_sub(FRAME_HEADER_SIZE)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Returns true if `status` may appear in a frame header.
pub fn is_valid_status(status: u32) -> bool {
    (MIN_STATUS..=MAX_STATUS).contains(&status)
}

/// Encode a frame header.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┐
/// │ Length       │ Status       │ Correlation id       │
/// │ (4B LE)      │ (4B LE)      │ (16B, GUID order)    │
/// └──────────────┴──────────────┴──────────────────────┘
/// ```
pub fn encode_frame_header(
    status: u32,
    correlation_id: Uuid,
    length: u32,
    dst: &mut impl BufMut,
) -> Result<()> {
    if !is_valid_status(status) {
        return Err(FrameError::InvalidStatus(status));
    }
    if (length as usize) < FRAME_HEADER_SIZE {
        return Err(FrameError::FrameTooShort {
            length: length as usize,
            min: FRAME_HEADER_SIZE,
        });
    }
    dst.put_u32_le(length);
    dst.put_u32_le(status);
    dst.put_slice(&correlation_id.to_bytes_le());
    Ok(())
}

/// Decode a frame header from the front of `src`.
///
/// Returns `NeedMoreData` if fewer than [`FRAME_HEADER_SIZE`] bytes are
/// available. Never consumes anything.
pub fn decode_frame_header(src: &[u8]) -> Result<Decoded<FrameHeader>> {
    let Some(head) = src.get(..FRAME_HEADER_SIZE) else {
        return Ok(Decoded::NeedMoreData);
    };

    let mut word = [0u8; 4];
    word.copy_from_slice(&head[0..4]);
    let length = u32::from_le_bytes(word);
    word.copy_from_slice(&head[4..8]);
    let status = u32::from_le_bytes(word);
    let mut id = [0u8; 16];
    id.copy_from_slice(&head[8..24]);

    if !is_valid_status(status) {
        return Err(FrameError::InvalidStatus(status));
    }
    if (length as usize) < FRAME_HEADER_SIZE {
        return Err(FrameError::FrameTooShort {
            length: length as usize,
            min: FRAME_HEADER_SIZE,
        });
    }

    Ok(Decoded::Complete(FrameHeader {
        length,
        status,
        correlation_id: Uuid::from_bytes_le(id),
    }))
}
