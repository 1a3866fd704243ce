//! Unified error type.

use std::fmt;
use std::net::SocketAddr;

/// The error type returned by the server's fallible operations.
///
/// Handler-level failures are expressed as HTTP responses written through the
/// [`ResponseWriter`](crate::ResponseWriter), never as `Error`s. Writer
/// operations themselves report `std::io::Error` so that failures pass
/// through the logging decorator untouched. This type surfaces infrastructure
/// failures only: binding a port or inspecting a listener.
#[derive(Debug)]
pub enum Error {
    /// The listening socket could not be bound.
    Bind { addr: SocketAddr, source: std::io::Error },
    /// Any other I/O failure on the listener.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "bind {addr}: {source}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
