//! The server's own [`ResponseWriter`]: a buffered response on top of hyper.
//!
//! Handlers run to completion before hyper sends anything, so the whole body
//! is buffered and sent with a `content-length`. There is nothing to flush
//! early, and the writer says so by not offering [`Flush`](crate::Flush).
//!
//! What it does offer:
//! - **hijack**: backed by hyper's upgrade mechanism, so only on HTTP/1.x
//!   connections. The response goes out as `101 Switching Protocols` (unless
//!   the handler chose another status) with the handler's headers, then the
//!   upgraded connection is released to whoever awaits
//!   [`Hijacked::connection`]. HTTP/2 streams cannot be upgraded and the
//!   writer does not offer [`Hijack`] there.
//! - **close notification**: fires when the connection task drops the
//!   in-flight request, which is how hyper reports a vanished client.

use std::io;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tracing::debug;

use crate::writer::{Closed, CloseNotify, Connection, Hijack, Hijacked, ResponseWriter};

pub(crate) struct TransportWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: Vec<u8>,
    upgrade: Option<OnUpgrade>,
    can_hijack: bool,
    hijacked: bool,
    closed: Closed,
}

impl TransportWriter {
    /// `upgrade` is `None` when the connection cannot be upgraded.
    pub(crate) fn new(upgrade: Option<OnUpgrade>, closed: Closed) -> Self {
        Self {
            headers: HeaderMap::new(),
            status: None,
            body: Vec::new(),
            can_hijack: upgrade.is_some(),
            upgrade,
            hijacked: false,
            closed,
        }
    }

    /// Turns what the handler wrote into the response hyper sends.
    pub(crate) fn into_response(self) -> http::Response<Full<Bytes>> {
        let (status, body) = if self.hijacked {
            (self.status.unwrap_or(StatusCode::SWITCHING_PROTOCOLS), Bytes::new())
        } else {
            (self.status.unwrap_or(StatusCode::OK), Bytes::from(self.body))
        };
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for TransportWriter {
    fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(hijacked_error());
        }
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.hijacked {
            debug!(%status, "status write on hijacked connection ignored");
            return;
        }
        match self.status {
            Some(current) => debug!(%current, %status, "superfluous status write ignored"),
            None => self.status = Some(status),
        }
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        if self.can_hijack { Some(self) } else { None }
    }

    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> {
        Some(self)
    }
}

impl Hijack for TransportWriter {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        if !self.can_hijack {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "connection cannot be upgraded"));
        }
        let upgrade = self.upgrade.take().ok_or_else(hijacked_error)?;
        self.hijacked = true;
        Ok(Hijacked::new(async move {
            upgrade
                .await
                .map(|upgraded| Box::new(TokioIo::new(upgraded)) as Box<dyn Connection>)
                .map_err(io::Error::other)
        }))
    }
}

impl CloseNotify for TransportWriter {
    fn close_notify(&mut self) -> Closed {
        self.closed.clone()
    }
}

fn hijacked_error() -> io::Error {
    io::Error::other("connection has been hijacked")
}
