//! The response-writer interface and its optional capabilities.
//!
//! # Capability probing
//!
//! A [`ResponseWriter`] always supports the base operations: header access,
//! body writes and an explicit status. Some writers can do more:
//!
//! | Capability | Trait | Probe |
//! |---|---|---|
//! | push buffered bytes to the client now | [`Flush`] | [`ResponseWriter::flusher`] |
//! | take over the raw connection (protocol upgrades) | [`Hijack`] | [`ResponseWriter::hijacker`] |
//! | learn that the client went away | [`CloseNotify`] | [`ResponseWriter::close_notifier`] |
//!
//! Callers never assume a capability. They ask:
//!
//! ```rust
//! use tsu_reqlog::ResponseWriter;
//!
//! fn stream_chunk(w: &mut dyn ResponseWriter, chunk: &[u8]) -> std::io::Result<()> {
//!     w.write_all(chunk)?;
//!     if let Some(f) = w.flusher() {
//!         f.flush();
//!     }
//!     Ok(())
//! }
//! ```
//!
//! A probe returning `None` means the writer does not have the capability.
//! Decorators must answer the probes truthfully for the writer they wrap, which
//! is what [`LoggingWriter`](crate::middleware::LoggingWriter) is built around.

use std::future::Future;
use std::io;
use std::pin::Pin;

use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

/// Where a handler writes its response.
pub trait ResponseWriter {
    /// The response headers. Changes after the first write have no effect on
    /// transports that have already sent the head.
    fn headers(&mut self) -> &mut HeaderMap;

    /// Writes part of the body, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Sets the response status explicitly.
    fn write_header(&mut self, status: StatusCode);

    /// Writes the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> { None }
    fn hijacker(&mut self) -> Option<&mut dyn Hijack> { None }
    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> { None }
}

/// Sends any buffered response bytes to the client immediately.
pub trait Flush {
    fn flush(&mut self);
}

/// Hands the underlying connection over to the caller.
///
/// After a successful hijack the transport stops managing the connection:
/// further body writes fail and the caller speaks whatever protocol it
/// negotiated over the returned stream.
pub trait Hijack {
    fn hijack(&mut self) -> io::Result<Hijacked>;
}

/// Reports abrupt client disconnects.
pub trait CloseNotify {
    fn close_notify(&mut self) -> Closed;
}

// ── Hijacked connections ──────────────────────────────────────────────────────

/// A raw, bidirectional byte stream taken over from the transport.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

type ConnectionFuture = Pin<Box<dyn Future<Output = io::Result<Box<dyn Connection>>> + Send>>;

/// The result of a successful [`Hijack::hijack`].
///
/// The connection may not be usable yet: hyper, for example, only releases
/// an upgraded connection once the `101 Switching Protocols` head has been
/// sent. Await [`Hijacked::connection`] from a task of its own.
/// Bytes the transport had already read past the request stay inside the
/// returned stream.
pub struct Hijacked {
    conn: ConnectionFuture,
}

impl Hijacked {
    pub fn new<F>(conn: F) -> Self
    where
        F: Future<Output = io::Result<Box<dyn Connection>>> + Send + 'static,
    {
        Self { conn: Box::pin(conn) }
    }

    /// Wraps a stream that is available right away.
    pub fn ready<C: Connection + 'static>(conn: C) -> Self {
        let conn: Box<dyn Connection> = Box::new(conn);
        Self::new(std::future::ready(Ok(conn)))
    }

    pub async fn connection(self) -> io::Result<Box<dyn Connection>> {
        self.conn.await
    }
}

impl std::fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hijacked").finish_non_exhaustive()
    }
}

// ── Close notification ────────────────────────────────────────────────────────

/// Creates a linked disconnect trigger and observer.
pub fn close_signal() -> (Disconnect, Closed) {
    let (tx, rx) = watch::channel(false);
    (Disconnect(tx), Closed(rx))
}

/// Transport side of a close notification. Fire it when the client is gone.
#[derive(Debug)]
pub struct Disconnect(watch::Sender<bool>);

impl Disconnect {
    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

/// Handler side of a close notification. Clones observe the same connection.
#[derive(Debug, Clone)]
pub struct Closed(watch::Receiver<bool>);

impl Closed {
    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the client disconnects.
    ///
    /// Never resolves if the request completes normally and the transport
    /// drops its [`Disconnect`] without firing it.
    pub async fn wait(mut self) {
        let fired = self.0.wait_for(|closed| *closed).await.map(|_| ());
        if fired.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
