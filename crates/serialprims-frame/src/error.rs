/// Errors that can occur while moving frames through a port.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5350 \"SP\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Failure reported by a port implementation outside this crate.
    #[error("transport failure: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl From<serialprims_transport::TransportError> for FrameError {
    fn from(err: serialprims_transport::TransportError) -> Self {
        use serialprims_transport::TransportError;

        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Transport(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
