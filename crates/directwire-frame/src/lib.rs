//! Binary response-envelope codec for a replica wire protocol.
//!
//! Every response on the wire is laid out as:
//! - A 24-byte frame header: total frame length, status code, correlation id
//! - A typed header collection (`id`, type tag, value) filling the rest of the frame
//! - An optional length-prefixed payload, present only when the
//!   `PayloadPresent` header says so
//!
//! Decoding is incremental: [`decode_envelope`] can be called on every chunk
//! a socket delivers and only consumes bytes once a whole envelope is buffered.
//! Decoded [`Envelope`]s are reference-counted views over the received bytes;
//! [`Envelope::to_result`] copies them out into an owned [`ResponseRecord`].

pub mod assemble;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod framer;
pub mod header;
pub mod reader;
pub mod status;
pub mod writer;

pub use assemble::{assemble, ContextMetadata, ResponseContent, ResponseRecord};
#[cfg(feature = "async")]
pub use codec::EnvelopeCodec;
pub use codec::{
    decode_envelope, encode_envelope, FrameConfig, DEFAULT_MAX_FRAME_LENGTH, DEFAULT_MAX_PAYLOAD,
};
pub use envelope::{BufferPool, CountingPool, Envelope};
pub use error::{FrameError, Result, TranslateError};
pub use framer::{try_frame, Decoded, FramedPayload};
pub use header::{
    keys, HeaderCollection, HeaderEntry, HeaderValue, ResponseHeader, TypedHeader, ValueType,
};
pub use reader::EnvelopeReader;
pub use status::{FrameHeader, FRAME_HEADER_SIZE, MAX_STATUS, MIN_STATUS};
pub use writer::EnvelopeWriter;
