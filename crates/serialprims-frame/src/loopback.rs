//! In-process transport.
//!
//! A [`LoopbackWriter`] and [`LoopbackReader`] pair joined by a channel.
//! Each written view is copied once into an owned frame, since the writer
//! port must be done with the caller's buffer when `write` returns.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::port::{Reader, Writer};
use crate::view::ByteView;

/// Create a connected writer/reader pair.
pub fn loopback() -> (LoopbackWriter, LoopbackReader) {
    let (tx, rx) = mpsc::channel();
    (
        LoopbackWriter { tx },
        LoopbackReader {
            rx,
            current: Bytes::new(),
            timeout: None,
        },
    )
}

/// Sending half of a loopback pair. Cloning yields another sender.
#[derive(Clone)]
pub struct LoopbackWriter {
    tx: Sender<Bytes>,
}

impl Writer for LoopbackWriter {
    fn write(&mut self, view: ByteView<'_>) -> Result<()> {
        self.tx
            .send(view.to_bytes())
            .map_err(|_| FrameError::ConnectionClosed)
    }
}

/// Receiving half of a loopback pair.
pub struct LoopbackReader {
    rx: Receiver<Bytes>,
    current: Bytes,
    timeout: Option<Duration>,
}

impl LoopbackReader {
    /// Bound how long `read` blocks waiting for a frame.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

impl Reader for LoopbackReader {
    fn read(&mut self) -> Result<ByteView<'_>> {
        self.current = match self.timeout {
            None => self.rx.recv().map_err(|_| FrameError::ConnectionClosed)?,
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => {
                    FrameError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut))
                }
                RecvTimeoutError::Disconnected => FrameError::ConnectionClosed,
            })?,
        };
        Ok(ByteView::from(&self.current))
    }
}
