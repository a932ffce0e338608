use tracing::trace;

use crate::port::{Reader, Serial, Writer};

/// A bidirectional session over one writer port and one reader port.
///
/// The controller borrows both ports for its whole lifetime and owns
/// neither. It keeps no state of its own: `send` forwards a single frame,
/// `recv` hands out the reader for pull-based consumption.
pub struct Controller<'a> {
    writer: &'a mut dyn Writer,
    reader: &'a mut dyn Reader,
}

impl<'a> Controller<'a> {
    pub fn new(writer: &'a mut dyn Writer, reader: &'a mut dyn Reader) -> Self {
        Self { writer, reader }
    }

    /// Encode `payload` and transmit it as exactly one frame.
    ///
    /// Encoding and writer errors are returned as-is; nothing is retried.
    pub fn send<S>(&mut self, payload: &mut S) -> Result<(), S::Error>
    where
        S: Serial + ?Sized,
    {
        let view = payload.serial()?;
        trace!(size = view.size(), "sending frame");
        self.writer.write(view)?;
        Ok(())
    }

    /// The reader port. No frame is read until the caller asks for one.
    pub fn recv(&mut self) -> &mut dyn Reader {
        &mut *self.reader
    }

    /// The writer port, for callers that already hold an encoded view.
    pub fn writer(&mut self) -> &mut dyn Writer {
        &mut *self.writer
    }
}
