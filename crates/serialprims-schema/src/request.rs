use serde::Deserialize;
use serde_json::value::RawValue;
use serialprims_frame::ByteView;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::kind::MessageKind;
use crate::registry::SchemaRegistry;
use crate::verifier::{Envelope, Verifier};

/// Inbound envelope that passed verification.
///
/// Only [`RequestReader::read`] constructs one, so holding a
/// `VerifiedRequest` is proof the bytes it borrows were checked.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedRequest<'a> {
    view: ByteView<'a>,
    envelope: Envelope<'a>,
}

impl<'a> VerifiedRequest<'a> {
    pub fn kind(&self) -> MessageKind {
        self.envelope.kind
    }

    /// The complete envelope bytes this request was verified from.
    pub fn view(&self) -> ByteView<'a> {
        self.view
    }

    /// Undecoded payload JSON.
    pub fn raw_payload(&self) -> &'a str {
        self.envelope.data.get()
    }

    /// The payload as the borrowed JSON value it was verified as.
    pub fn raw_value(&self) -> &'a RawValue {
        self.envelope.data
    }

    /// Decode the payload as `T`.
    pub fn payload<T: Deserialize<'a>>(&self) -> Result<T> {
        serde_json::from_str(self.envelope.data.get()).map_err(SchemaError::Decode)
    }
}

/// Verify-then-interpret reader for inbound envelopes.
///
/// Stateless apart from the registry it consults; one reader can check any
/// number of frames.
#[derive(Clone, Copy)]
pub struct RequestReader<'s> {
    registry: &'s SchemaRegistry,
}

impl<'s> RequestReader<'s> {
    pub fn new(registry: &'s SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Verify `msg` and expose it as a request.
    ///
    /// Empty input fails without touching the verifier. On success the
    /// returned request borrows `msg` directly, no bytes are copied.
    pub fn read<'a>(&self, msg: ByteView<'a>) -> Result<VerifiedRequest<'a>> {
        if msg.is_empty() {
            return Err(SchemaError::Empty);
        }

        let verified = Verifier::new(msg, self.registry.config().max_message_size)
            .verify_envelope()
            .and_then(|envelope| {
                self.registry
                    .validate(envelope.kind, envelope.data.get())
                    .map(|()| envelope)
            });

        match verified {
            Ok(envelope) => Ok(VerifiedRequest {
                view: msg,
                envelope,
            }),
            Err(err) => {
                debug!(size = msg.size(), error = %err, "request failed verification");
                Err(err)
            }
        }
    }

    /// Whether `msg` would pass [`read`](Self::read).
    pub fn is_valid(&self, msg: ByteView<'_>) -> bool {
        self.read(msg).is_ok()
    }

    pub fn registry(&self) -> &'s SchemaRegistry {
        self.registry
    }
}
