use std::fmt;

use bytes::Bytes;

/// A non-owning view over an externally owned byte range.
///
/// Copying a view duplicates the reference, never the bytes. The lifetime
/// `'a` is the lifetime of the owning buffer (a builder's finished envelope,
/// a reader's receive buffer), so a view cannot be used once that buffer is
/// reset or reused.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// A view over no bytes.
    pub const EMPTY: ByteView<'static> = ByteView { data: &[] };

    /// Create a view over `data`.
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of bytes in view.
    pub const fn size(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The viewed bytes, borrowed for the owner's lifetime.
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Rebind the view to another byte range.
    pub fn set_data(&mut self, data: &'a [u8]) {
        self.data = data;
    }

    /// Copy the bytes out as signed octets.
    ///
    /// The result is independent of the owning buffer.
    pub fn to_signed_vec(&self) -> Vec<i8> {
        self.data.iter().map(|&b| b as i8).collect()
    }

    /// Copy the bytes into an owned [`Bytes`].
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data)
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteView<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Bytes> for ByteView<'a> {
    fn from(data: &'a Bytes) -> Self {
        Self::new(data.as_ref())
    }
}

impl<'a> From<&'a Vec<u8>> for ByteView<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data.as_slice())
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 16;
        let shown = &self.data[..self.data.len().min(PREVIEW)];
        f.debug_struct("ByteView")
            .field("size", &self.data.len())
            .field("head", &shown)
            .finish()
    }
}
