use serialprims_frame::{ByteView, Serial};
use tracing::debug;

use crate::builder::{MessageBuilder, PayloadOffset};
use crate::config::BuilderConfig;
use crate::error::{Result, SchemaError};
use crate::kind::MessageKind;
use crate::messages::Payload;

/// Outbound envelope for one payload type.
///
/// Pairs a payload value with a private [`MessageBuilder`]. `write` always
/// starts from a cleared builder, so repeated calls yield identical bytes for
/// an unchanged payload and never accumulate.
#[derive(Debug)]
pub struct ResponseWriter<P> {
    builder: MessageBuilder,
    data: P,
}

impl<P: Payload> ResponseWriter<P> {
    pub fn new(data: P) -> Self {
        Self::with_config(data, BuilderConfig::default())
    }

    pub fn with_config(data: P, config: BuilderConfig) -> Self {
        Self {
            builder: MessageBuilder::with_config(config),
            data,
        }
    }

    pub fn data(&self) -> &P {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut P {
        &mut self.data
    }

    pub fn set_data(&mut self, data: P) {
        self.data = data;
    }

    /// Drop any encoded bytes without touching the payload.
    pub fn clear(&mut self) {
        self.builder.clear();
    }

    /// Encode the payload as a `P::KIND` envelope.
    ///
    /// The returned view stays valid until the next `write`, `finish` or
    /// `clear`.
    pub fn write(&mut self) -> Result<ByteView<'_>> {
        self.builder.clear();
        let payload = self.builder.build_payload(&self.data)?;
        let view = self.builder.finish(payload, P::KIND)?;
        debug!(kind = %P::KIND, size = view.size(), "response encoded");
        Ok(view)
    }

    /// Wrap a payload previously built on [`builder_mut`](Self::builder_mut)
    /// under an explicit kind.
    pub fn finish(&mut self, payload: PayloadOffset, kind: MessageKind) -> Result<ByteView<'_>> {
        self.builder.finish(payload, kind)
    }

    /// Direct access to the underlying builder for hand-assembled envelopes.
    pub fn builder_mut(&mut self) -> &mut MessageBuilder {
        &mut self.builder
    }

    pub fn into_data(self) -> P {
        self.data
    }
}

impl<P: Payload + Default> Default for ResponseWriter<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: Payload> Serial for ResponseWriter<P> {
    type Error = SchemaError;

    fn serial(&mut self) -> Result<ByteView<'_>> {
        self.write()
    }
}
