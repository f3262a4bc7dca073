//! Direct replica transport: response wire codec.
//!
//! directwire decodes and encodes the binary response envelopes replicas send
//! over persistent direct connections: frame header, typed header collection,
//! optional payload, and the reference-counted envelope that owns the bytes.
//!
//! # Crate Structure
//!
//! - [`frame`]: frame and header codecs, envelopes, response assembly, stream adapters
//!
//! The most common types are also re-exported at the crate root.

/// Re-export frame types.
pub mod frame {
    pub use directwire_frame::*;
}

pub use directwire_frame::{
    assemble, decode_envelope, encode_envelope, keys, ContextMetadata, Decoded, Envelope,
    EnvelopeReader, EnvelopeWriter, FrameConfig, FrameError, HeaderCollection, HeaderValue,
    ResponseHeader, ResponseRecord, TranslateError,
};
