use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// TCP transport.
///
/// Accepted and connected streams have `TCP_NODELAY` set; frames are small
/// and latency matters more than coalescing.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on a TCP address.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: format!("{addr:?}"),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SerialStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(SerialStream::from_tcp(stream))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<SerialStream> {
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: format!("{addr:?}"),
            source,
        })?;
        stream.set_nodelay(true)?;
        debug!(?addr, "connected over tcp");
        Ok(SerialStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn bind_accept_connect_on_ephemeral_port() {
        let listener = TcpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let handle = std::thread::spawn(move || {
            let mut client = TcpSocket::connect(addr).unwrap();
            client.write_all(b"ping").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(server.transport_name(), "tcp");
        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        let addr = {
            let listener = TcpSocket::bind("127.0.0.1:0").unwrap();
            listener.local_addr()
        };
        let result = TcpSocket::connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
