use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;
use crate::tcp::TcpSocket;

#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where a serial session lives.
///
/// Parsed from `unix:<path>`, `tcp:<host:port>` or a bare `<host:port>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Connect to this endpoint.
    pub fn connect(&self) -> Result<SerialStream> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::InvalidEndpoint(format!(
                "unix:{}",
                path.display()
            ))),
            Endpoint::Tcp(addr) => TcpSocket::connect(addr.as_str()),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<Listener> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::bind(path).map(Listener::Unix),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::InvalidEndpoint(format!(
                "unix:{}",
                path.display()
            ))),
            Endpoint::Tcp(addr) => TcpSocket::bind(addr.as_str()).map(Listener::Tcp),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let addr = input.strip_prefix("tcp:").unwrap_or(input);
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(addr.to_string()))
            }
            _ => Err(TransportError::InvalidEndpoint(input.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// A bound listener for either transport.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl Listener {
    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SerialStream> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => listener.accept(),
            Listener::Tcp(listener) => listener.accept(),
        }
    }

    /// The endpoint clients should connect to.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
            Listener::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
        }
    }
}
