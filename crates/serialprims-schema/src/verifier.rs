use serde::Deserialize;
use serde_json::value::RawValue;
use serialprims_frame::ByteView;

use crate::error::{Result, SchemaError};
use crate::kind::MessageKind;

/// The root of every frame: kind discriminator plus an undecoded payload.
///
/// `data` borrows straight from the verified bytes; decoding it is left to
/// whoever dispatches on `kind`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<'a> {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(borrow)]
    pub data: &'a RawValue,
}

/// Structural verifier bound to one exact byte range.
pub struct Verifier<'a> {
    bytes: &'a [u8],
    max_size: usize,
}

impl<'a> Verifier<'a> {
    pub fn new(view: ByteView<'a>, max_size: usize) -> Self {
        Self {
            bytes: view.data(),
            max_size,
        }
    }

    /// Check the bytes form exactly one envelope and interpret them as its
    /// root.
    ///
    /// Rejects, in order: empty input, oversized input, anything that is not
    /// a single JSON object holding exactly `type` (a known kind) and `data`
    /// (an object), including trailing bytes and duplicate fields.
    pub fn verify_envelope(&self) -> Result<Envelope<'a>> {
        if self.bytes.is_empty() {
            return Err(SchemaError::Empty);
        }
        if self.bytes.len() > self.max_size {
            return Err(SchemaError::TooLarge {
                size: self.bytes.len(),
                max: self.max_size,
            });
        }

        let envelope: Envelope<'a> = serde_json::from_slice(self.bytes)
            .map_err(|err| SchemaError::Malformed(err.to_string()))?;

        if !envelope.data.get().starts_with('{') {
            return Err(SchemaError::Malformed(format!(
                "{} payload must be an object",
                envelope.kind
            )));
        }

        Ok(envelope)
    }
}
