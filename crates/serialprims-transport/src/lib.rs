//! Connected byte-stream transports.
//!
//! Provides a unified stream type over the transports a serial session can
//! run on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP sockets
//!
//! This is the lowest layer of serialprims. Framing and the writer/reader
//! ports are built on top of the [`SerialStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::SerialStream;
pub use tcp::TcpSocket;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
