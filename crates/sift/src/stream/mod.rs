//! Secondary-stream transport decoding.

mod decoder;

pub use decoder::{drain_events, EventStream, FrameDecoder};

use thiserror::Error;

/// Errors from a frame payload. Recoverable: the frame is dropped and
/// decoding continues with the next frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not the expected JSON envelope.
    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The frame bytes were not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

/// A network-level failure on either stream. Terminal for the affected
/// stream only.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying connection failed.
    #[error("transport failed: {0}")]
    Connection(String),

    /// The stream was aborted before completion.
    #[error("stream aborted")]
    Aborted,
}

/// Item-level error of a decoded event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A single frame failed to decode; later frames still arrive.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed; no further frames will arrive.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
