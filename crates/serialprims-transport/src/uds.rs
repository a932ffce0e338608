use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Device/inode pair naming one filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SocketIdentity {
    dev: u64,
    ino: u64,
}

impl SocketIdentity {
    fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

/// Listening Unix domain socket for serial sessions.
///
/// The socket file is created owner-only by default and removed on drop,
/// unless something else has taken over the path in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: SocketIdentity,
}

impl UnixDomainSocket {
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` capacity, including the trailing NUL.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind with an explicit permission mode for the socket file.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bound = clear_stale_socket(&path)
            .and_then(|()| UnixListener::bind(&path))
            .and_then(|listener| {
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
                let identity = SocketIdentity::of(&std::fs::symlink_metadata(&path)?);
                Ok((listener, identity))
            });
        let (listener, identity) = bound.map_err(|source| TransportError::Bind {
            addr: path.display().to_string(),
            source,
        })?;

        info!(?path, mode = %format!("{mode:o}"), "listening on unix domain socket");
        Ok(Self {
            listener,
            path,
            identity,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SerialStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(SerialStream::from_unix(stream))
    }

    /// Connect to a listening socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<SerialStream> {
        let path = path.as_ref();
        let stream =
            UnixStream::connect(path).map_err(|source| TransportError::Connect {
                addr: path.display().to_string(),
                source,
            })?;
        debug!(?path, "connected to unix domain socket");
        Ok(SerialStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Remove a leftover socket at `path`. Anything that is not a socket is
/// left alone and reported as `AlreadyExists`.
fn clear_stale_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path)
        }
        Ok(_) => Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        )),
        Err(_) => Ok(()),
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let still_ours = std::fs::symlink_metadata(&self.path).is_ok_and(|metadata| {
            metadata.file_type().is_socket() && SocketIdentity::of(&metadata) == self.identity
        });
        if still_ours {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path replaced, leaving it in place");
        }
    }
}
