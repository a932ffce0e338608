use serialprims_frame::FrameError;

use crate::kind::MessageKind;

/// Errors raised while encoding or verifying envelopes.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Zero-length input; nothing was handed to the verifier.
    #[error("empty message")]
    Empty,

    /// The message exceeds the configured verification limit.
    #[error("message too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// The bytes do not form a well-structured envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The payload failed its kind's schema.
    #[error("payload validation failed for {kind}: {message}")]
    ValidationFailed { kind: MessageKind, message: String },

    /// No payload schema registered for the kind while one is required.
    #[error("no payload schema registered for {0}")]
    NoSchema(MessageKind),

    /// A discriminator or name that maps to no message kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// A payload offset from before the builder's last clear.
    #[error("payload offset belongs to a cleared builder generation")]
    StaleOffset,

    /// Payloads must encode as JSON objects.
    #[error("payload must encode as a JSON object")]
    PayloadNotObject,

    /// Serializing a payload failed.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// A verified payload did not match the requested type.
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// A schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// A schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// Failure from the port the envelope was sent through.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
