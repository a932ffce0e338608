use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use serialprims_transport::SerialStream;
use tracing::trace;

use crate::codec::{complete_frame_len, decode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::port::Reader;
use crate::view::ByteView;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Framed [`Reader`] port over any byte stream.
///
/// Bytes are pulled from `inner` in chunks and decoded from an internal
/// buffer, so short reads never surface to callers. The view handed out by
/// [`Reader::read`] points into the frame kept in `current`, which the next
/// read replaces.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    current: Bytes,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            current: Bytes::new(),
            config,
        }
    }

    /// Block until one whole frame is buffered and return its payload.
    ///
    /// EOF, whether between frames or inside one, is
    /// [`FrameError::ConnectionClosed`].
    pub fn read_frame(&mut self) -> Result<Bytes> {
        while !self.fill()? {}
        decode_frame(&mut self.buf, self.config.max_payload_size)?
            .ok_or(FrameError::ConnectionClosed)
    }

    /// Returns `true` once the buffer holds a complete frame.
    fn fill(&mut self) -> Result<bool> {
        if complete_frame_len(&self.buf, self.config.max_payload_size)?.is_some() {
            return Ok(true);
        }

        let filled = self.buf.len();
        self.buf.resize(filled + READ_CHUNK_SIZE, 0);
        let read = loop {
            match self.inner.read(&mut self.buf[filled..]) {
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        let read = match read {
            Ok(read) => read,
            Err(err) => {
                self.buf.truncate(filled);
                return Err(FrameError::Io(err));
            }
        };
        self.buf.truncate(filled + read);

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        trace!(read, buffered = self.buf.len(), "stream bytes buffered");
        Ok(false)
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> Reader for FrameReader<T> {
    fn read(&mut self) -> Result<ByteView<'_>> {
        self.current = self.read_frame()?;
        Ok(ByteView::from(&self.current))
    }
}

impl FrameReader<SerialStream> {
    /// Wrap a connected stream, applying `config.read_timeout` to it first.
    pub fn with_config_stream(inner: SerialStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
