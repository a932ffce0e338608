use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;
use serialprims_frame::ByteView;
use tracing::trace;

use crate::config::BuilderConfig;
use crate::error::{Result, SchemaError};
use crate::kind::MessageKind;

/// Handle to a payload encoded into a [`MessageBuilder`]'s scratch space.
///
/// Only valid for the builder generation that produced it; `clear` retires
/// every outstanding offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadOffset {
    start: usize,
    end: usize,
    generation: u64,
}

impl PayloadOffset {
    /// Encoded payload length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Reusable envelope encoder.
///
/// Payloads are encoded into scratch space first, then `finish` wraps one of
/// them in the envelope. Both buffers keep their capacity across `clear`, so
/// a long-lived builder stops allocating once it has seen its largest
/// message. The view returned by `finish` borrows the builder and therefore
/// cannot outlive the next `clear`/`finish`.
#[derive(Debug)]
pub struct MessageBuilder {
    scratch: BytesMut,
    buf: BytesMut,
    generation: u64,
    finished: bool,
    config: BuilderConfig,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            scratch: BytesMut::with_capacity(config.capacity),
            buf: BytesMut::with_capacity(config.capacity),
            generation: 0,
            finished: false,
            config,
        }
    }

    /// Discard all encoded content, finished or not.
    pub fn clear(&mut self) {
        self.scratch.clear();
        self.buf.clear();
        self.generation = self.generation.wrapping_add(1);
        self.finished = false;
    }

    /// Encode `value` as a payload object and return its offset.
    pub fn build_payload<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<PayloadOffset> {
        let start = self.scratch.len();
        let encoded = if self.config.force_defaults {
            serde_json::to_writer((&mut self.scratch).writer(), value)
        } else {
            serde_json::to_value(value).and_then(|mut tree| {
                strip_defaults(&mut tree);
                serde_json::to_writer((&mut self.scratch).writer(), &tree)
            })
        };
        if let Err(err) = encoded {
            self.scratch.truncate(start);
            return Err(SchemaError::Encode(err));
        }

        if self.scratch.get(start) != Some(&b'{') {
            self.scratch.truncate(start);
            return Err(SchemaError::PayloadNotObject);
        }

        Ok(PayloadOffset {
            start,
            end: self.scratch.len(),
            generation: self.generation,
        })
    }

    /// Wrap the payload at `payload` in an envelope of `kind` and return the
    /// finished bytes.
    pub fn finish(&mut self, payload: PayloadOffset, kind: MessageKind) -> Result<ByteView<'_>> {
        if payload.generation != self.generation || payload.end > self.scratch.len() {
            return Err(SchemaError::StaleOffset);
        }

        self.buf.clear();
        self.buf.reserve(payload.len() + 20);
        self.buf.put_slice(b"{\"type\":");
        serde_json::to_writer((&mut self.buf).writer(), &kind).map_err(SchemaError::Encode)?;
        self.buf.put_slice(b",\"data\":");
        self.buf
            .put_slice(&self.scratch[payload.start..payload.end]);
        self.buf.put_u8(b'}');
        self.finished = true;

        trace!(%kind, size = self.buf.len(), "envelope finished");
        Ok(ByteView::new(&self.buf))
    }

    /// Clear, encode `value`, and finish it as `kind` in one step.
    pub fn encode<T: Serialize + ?Sized>(
        &mut self,
        kind: MessageKind,
        value: &T,
    ) -> Result<ByteView<'_>> {
        self.clear();
        let payload = self.build_payload(value)?;
        self.finish(payload, kind)
    }

    /// The last finished envelope, if nothing cleared it since.
    pub fn finished_data(&self) -> Option<ByteView<'_>> {
        self.finished.then(|| ByteView::new(&self.buf))
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop object members that hold their zero value, depth first.
fn strip_defaults(value: &mut Value) {
    match value {
        Value::Object(map) => map.retain(|_, member| {
            strip_defaults(member);
            !is_zero_value(member)
        }),
        Value::Array(items) => items.iter_mut().for_each(strip_defaults),
        _ => {}
    }
}

fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
