use std::sync::Arc;

use bytes::BytesMut;

use crate::envelope::{BufferPool, Envelope};
use crate::error::Result;
use crate::framer::Decoded;

/// Default maximum frame length (frame header + headers): 2 MiB.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 2 * 1024 * 1024;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration for envelope decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum declared frame length in bytes. Default: 2 MiB.
    pub max_frame_length: usize,
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Pool that receives each decoded envelope's bytes on final release.
    pub pool: Option<Arc<dyn BufferPool>>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            pool: None,
        }
    }
}

/// Decode an envelope from a receive buffer.
///
/// Call this every time bytes are appended to `src`. Returns
/// `Decoded::NeedMoreData` without consuming anything until a whole frame is
/// buffered; on success only that frame's bytes are consumed.
pub fn decode_envelope(src: &mut BytesMut, config: &FrameConfig) -> Result<Decoded<Envelope>> {
    Envelope::decode(src, config)
}

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬───────────────┬─────────────────┬──────────────┬──────────────┐
/// │ Length   │ Status   │ Correlation   │ Header entries  │ Payload len  │ Payload      │
/// │ (4B LE)  │ (4B LE)  │ id (16B)      │ (Length - 24)   │ (4B LE)*     │ (len bytes)* │
/// └──────────┴──────────┴───────────────┴─────────────────┴──────────────┴──────────────┘
///                                              * only when PayloadPresent is set
/// ```
pub fn encode_envelope(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    envelope.encode(dst)
}

#[cfg(feature = "async")]
pub use self::tokio_codec::EnvelopeCodec;

#[cfg(feature = "async")]
mod tokio_codec {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{decode_envelope, FrameConfig};
    use crate::envelope::Envelope;
    use crate::error::FrameError;

    /// `tokio-util` codec for framed envelope streams.
    #[derive(Debug, Clone, Default)]
    pub struct EnvelopeCodec {
        config: FrameConfig,
    }

    impl EnvelopeCodec {
        pub fn new(config: FrameConfig) -> Self {
            Self { config }
        }

        pub fn config(&self) -> &FrameConfig {
            &self.config
        }
    }

    impl Decoder for EnvelopeCodec {
        type Item = Envelope;
        type Error = FrameError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, FrameError> {
            Ok(decode_envelope(src, &self.config)?.into_option())
        }
    }

    impl Encoder<&Envelope> for EnvelopeCodec {
        type Error = FrameError;

        fn encode(&mut self, item: &Envelope, dst: &mut BytesMut) -> Result<(), FrameError> {
            item.encode(dst)
        }
    }

    impl Encoder<Envelope> for EnvelopeCodec {
        type Error = FrameError;

        fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), FrameError> {
            item.encode(dst)
        }
    }
}
