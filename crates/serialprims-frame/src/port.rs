//! Writer/reader capability ports.
//!
//! Concrete transports (stream framing, loopback channels, test doubles)
//! implement these traits; everything above them only sees byte views.

use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::view::ByteView;

/// Outbound port: pushes one frame out.
pub trait Writer {
    /// Transmit every byte in `view` before returning.
    ///
    /// The caller may invalidate the view's backing buffer as soon as this
    /// returns, so implementations must not hold on to it.
    fn write(&mut self, view: ByteView<'_>) -> Result<()>;
}

/// Inbound port: yields the next frame.
pub trait Reader {
    /// Block until the next frame is available.
    ///
    /// The returned view borrows the reader's receive buffer and is valid
    /// until the next call to `read`.
    fn read(&mut self) -> Result<ByteView<'_>>;
}

/// A payload that can present its encoded byte form.
///
/// `Error` must absorb [`FrameError`] so that writer failures reach the
/// caller unchanged.
pub trait Serial {
    type Error: From<FrameError>;

    fn serial(&mut self) -> std::result::Result<ByteView<'_>, Self::Error>;
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn write(&mut self, view: ByteView<'_>) -> Result<()> {
        (**self).write(view)
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write(&mut self, view: ByteView<'_>) -> Result<()> {
        (**self).write(view)
    }
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn read(&mut self) -> Result<ByteView<'_>> {
        (**self).read()
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn read(&mut self) -> Result<ByteView<'_>> {
        (**self).read()
    }
}

impl Serial for ByteView<'_> {
    type Error = FrameError;

    fn serial(&mut self) -> Result<ByteView<'_>> {
        Ok(*self)
    }
}

impl Serial for [u8] {
    type Error = FrameError;

    fn serial(&mut self) -> Result<ByteView<'_>> {
        Ok(ByteView::new(self))
    }
}

impl Serial for Vec<u8> {
    type Error = FrameError;

    fn serial(&mut self) -> Result<ByteView<'_>> {
        Ok(ByteView::new(self.as_slice()))
    }
}

impl Serial for Bytes {
    type Error = FrameError;

    fn serial(&mut self) -> Result<ByteView<'_>> {
        Ok(ByteView::new(&self[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::loopback::loopback;

    #[test]
    fn owned_buffers_present_their_own_bytes() {
        let mut bytes = Bytes::from_static(b"{\"type\":3}");
        let start = bytes.as_ptr();
        let view = bytes.serial().unwrap();
        assert_eq!(view.data(), b"{\"type\":3}");
        assert_eq!(view.data().as_ptr(), start);

        let mut vec = b"abc".to_vec();
        assert_eq!(vec.serial().unwrap().data(), b"abc");
    }

    #[test]
    fn controller_sends_owned_bytes() {
        let (mut tx, mut rx) = loopback();
        let (_idle_tx, mut idle_rx) = loopback();
        let mut payload = Bytes::from_static(b"frame");

        Controller::new(&mut tx, &mut idle_rx)
            .send(&mut payload)
            .unwrap();
        assert_eq!(rx.read().unwrap().data(), b"frame");
    }
}
