//! Verify-then-interpret request/response envelopes.
//!
//! Every frame is an envelope with exactly two fields: a message-kind
//! discriminator and a payload object.
//!
//! ```text
//! {"type": <kind u8>, "data": { ...payload... }}
//! ```
//!
//! Inbound bytes never reach typed access without passing the [`Verifier`]:
//! [`RequestReader::read`] hands back a [`VerifiedRequest`] only when the
//! envelope (and, when registered, the payload schema for its kind) checks
//! out. Outbound envelopes are encoded by a reusable [`MessageBuilder`],
//! usually driven through a [`ResponseWriter`].

pub mod builder;
pub mod config;
pub mod error;
pub mod kind;
pub mod messages;
pub mod registry;
pub mod request;
pub mod response;
pub mod verifier;

pub use builder::{MessageBuilder, PayloadOffset};
pub use config::{BuilderConfig, SchemaConfig};
pub use error::{Result, SchemaError};
pub use kind::MessageKind;
pub use messages::{EchoMessage, ErrorResponse, Payload, Ping, TestInfoRequest, TestInfoResponse};
pub use registry::SchemaRegistry;
pub use request::{RequestReader, VerifiedRequest};
pub use response::ResponseWriter;
pub use verifier::{Envelope, Verifier};
