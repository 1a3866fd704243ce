//! A response-writer decorator that records status and body size.
//!
//! # Why four types
//!
//! Callers discover optional capabilities by probing
//! ([`ResponseWriter::hijacker`] and friends). A decorator that always
//! answered "yes" would lie about writers that cannot hijack; one that always
//! answered "no" would break WebSocket upgrades behind the logging
//! middleware. So [`LoggingWriter::wrap`] probes the wrapped writer once and
//! picks the narrowest type that matches:
//!
//! | wrapped writer offers | variant | extra traits |
//! |---|---|---|
//! | neither | [`ResponseLogger`] | none |
//! | hijack | [`HijackLogger`] | [`Hijack`] |
//! | close-notify | [`CloseNotifyLogger`] | [`CloseNotify`] |
//! | both | [`HijackCloseNotifyLogger`] | [`Hijack`], [`CloseNotify`] |
//!
//! Flushing is the exception: every variant exposes [`Flush`] and turns it
//! into a no-op when the wrapped writer cannot flush, because a flush that
//! does nothing is indistinguishable from a flush on an unbuffered writer.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::writer::{Closed, CloseNotify, Flush, Hijack, Hijacked, ResponseWriter};

// ── Base decorator ────────────────────────────────────────────────────────────

/// Records status and size for a writer that can neither hijack nor notify.
///
/// The other variants wrap this one and add their capability on top.
pub struct ResponseLogger<'w> {
    w: &'w mut dyn ResponseWriter,
    status: u16,
    size: usize,
}

impl<'w> ResponseLogger<'w> {
    fn new(w: &'w mut dyn ResponseWriter) -> Self {
        Self { w, status: 0, size: 0 }
    }

    /// The recorded status code, `0` until a status is set or a body byte
    /// is written.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Total bytes the wrapped writer reported as written.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl ResponseWriter for ResponseLogger<'_> {
    fn headers(&mut self) -> &mut HeaderMap {
        self.w.headers()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status == 0 {
            // Writing a body without a status means 200.
            self.status = StatusCode::OK.as_u16();
        }
        // A failed write reports no bytes, so size only moves on success.
        let n = self.w.write(buf)?;
        self.size += n;
        Ok(n)
    }

    fn write_header(&mut self, status: StatusCode) {
        self.w.write_header(status);
        self.status = status.as_u16();
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }
}

impl Flush for ResponseLogger<'_> {
    fn flush(&mut self) {
        if let Some(f) = self.w.flusher() {
            f.flush();
        }
    }
}

impl ResponseLogger<'_> {
    fn hijack_inner(&mut self) -> io::Result<Hijacked> {
        let hijacked = match self.w.hijacker() {
            Some(h) => h.hijack()?,
            None => return Err(unsupported("hijack")),
        };
        if self.status == 0 {
            self.status = StatusCode::SWITCHING_PROTOCOLS.as_u16();
        }
        Ok(hijacked)
    }

    fn close_notify_inner(&mut self) -> io::Result<Closed> {
        match self.w.close_notifier() {
            Some(c) => Ok(c.close_notify()),
            None => Err(unsupported("close notification")),
        }
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("underlying response writer does not support {what}"),
    )
}

// ── Capability variants ───────────────────────────────────────────────────────

macro_rules! delegate_base {
    ($ty:ident) => {
        impl<'w> $ty<'w> {
            pub fn status(&self) -> u16 { self.0.status() }
            pub fn size(&self) -> usize { self.0.size() }
        }

        impl Flush for $ty<'_> {
            fn flush(&mut self) { self.0.flush() }
        }
    };
}

/// Records status and size, and passes hijacking through.
///
/// A successful hijack with no status recorded yet counts as
/// `101 Switching Protocols`.
pub struct HijackLogger<'w>(ResponseLogger<'w>);

delegate_base!(HijackLogger);

impl ResponseWriter for HijackLogger<'_> {
    fn headers(&mut self) -> &mut HeaderMap { self.0.headers() }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn write_header(&mut self, status: StatusCode) { self.0.write_header(status) }
    fn flusher(&mut self) -> Option<&mut dyn Flush> { Some(self) }
    fn hijacker(&mut self) -> Option<&mut dyn Hijack> { Some(self) }
}

impl Hijack for HijackLogger<'_> {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        self.0.hijack_inner()
    }
}

/// Records status and size, and passes close notification through.
pub struct CloseNotifyLogger<'w>(ResponseLogger<'w>);

delegate_base!(CloseNotifyLogger);

impl ResponseWriter for CloseNotifyLogger<'_> {
    fn headers(&mut self) -> &mut HeaderMap { self.0.headers() }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn write_header(&mut self, status: StatusCode) { self.0.write_header(status) }
    fn flusher(&mut self) -> Option<&mut dyn Flush> { Some(self) }
    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> { Some(self) }
}

impl CloseNotify for CloseNotifyLogger<'_> {
    fn close_notify(&mut self) -> Closed {
        close_notify_or_never(&mut self.0)
    }
}

/// Records status and size, and passes both hijacking and close
/// notification through.
pub struct HijackCloseNotifyLogger<'w>(ResponseLogger<'w>);

delegate_base!(HijackCloseNotifyLogger);

impl ResponseWriter for HijackCloseNotifyLogger<'_> {
    fn headers(&mut self) -> &mut HeaderMap { self.0.headers() }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn write_header(&mut self, status: StatusCode) { self.0.write_header(status) }
    fn flusher(&mut self) -> Option<&mut dyn Flush> { Some(self) }
    fn hijacker(&mut self) -> Option<&mut dyn Hijack> { Some(self) }
    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> { Some(self) }
}

impl Hijack for HijackCloseNotifyLogger<'_> {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        self.0.hijack_inner()
    }
}

impl CloseNotify for HijackCloseNotifyLogger<'_> {
    fn close_notify(&mut self) -> Closed {
        close_notify_or_never(&mut self.0)
    }
}

/// The wrapped writer answered the probe at wrap time, so it answers it now.
/// If it changed its mind, hand out a signal that never fires rather than
/// inventing a disconnect.
fn close_notify_or_never(base: &mut ResponseLogger<'_>) -> Closed {
    base.close_notify_inner().unwrap_or_else(|_| {
        let (disconnect, closed) = crate::writer::close_signal();
        drop(disconnect);
        closed
    })
}

// ── Variant selection ─────────────────────────────────────────────────────────

/// A status- and size-recording view of a response writer, shaped to the
/// wrapped writer's capabilities.
///
/// Build with [`LoggingWriter::wrap`]; read the results with
/// [`status`](LoggingWriter::status) and [`size`](LoggingWriter::size) once
/// the handler returns.
pub enum LoggingWriter<'w> {
    Plain(ResponseLogger<'w>),
    Hijack(HijackLogger<'w>),
    CloseNotify(CloseNotifyLogger<'w>),
    HijackCloseNotify(HijackCloseNotifyLogger<'w>),
}

macro_rules! each_variant {
    ($self:expr, $w:ident => $body:expr) => {
        match $self {
            LoggingWriter::Plain($w) => $body,
            LoggingWriter::Hijack($w) => $body,
            LoggingWriter::CloseNotify($w) => $body,
            LoggingWriter::HijackCloseNotify($w) => $body,
        }
    };
}

impl<'w> LoggingWriter<'w> {
    /// Probes `w` once and wraps it in the matching variant.
    pub fn wrap(w: &'w mut dyn ResponseWriter) -> Self {
        let hijack = w.hijacker().is_some();
        let close_notify = w.close_notifier().is_some();
        let base = ResponseLogger::new(w);
        match (hijack, close_notify) {
            (false, false) => Self::Plain(base),
            (true, false) => Self::Hijack(HijackLogger(base)),
            (false, true) => Self::CloseNotify(CloseNotifyLogger(base)),
            (true, true) => Self::HijackCloseNotify(HijackCloseNotifyLogger(base)),
        }
    }

    pub fn status(&self) -> u16 {
        each_variant!(self, w => w.status())
    }

    pub fn size(&self) -> usize {
        each_variant!(self, w => w.size())
    }

    /// Hijacks through the wrapped writer.
    ///
    /// Fails with [`io::ErrorKind::Unsupported`] on variants without the
    /// capability, without touching the wrapped writer.
    pub fn hijack(&mut self) -> io::Result<Hijacked> {
        match self {
            Self::Hijack(w) => w.hijack(),
            Self::HijackCloseNotify(w) => w.hijack(),
            Self::Plain(_) | Self::CloseNotify(_) => Err(unsupported("hijack")),
        }
    }
}

impl ResponseWriter for LoggingWriter<'_> {
    fn headers(&mut self) -> &mut HeaderMap {
        each_variant!(self, w => w.headers())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        each_variant!(self, w => w.write(buf))
    }

    fn write_header(&mut self, status: StatusCode) {
        each_variant!(self, w => w.write_header(status))
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        each_variant!(self, w => w.flusher())
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        each_variant!(self, w => w.hijacker())
    }

    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> {
        each_variant!(self, w => w.close_notifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{close_signal, Disconnect};

    /// A configurable in-memory writer.
    #[derive(Default)]
    struct Recorder {
        headers: HeaderMap,
        status: Option<StatusCode>,
        body: Vec<u8>,
        flushes: usize,
        can_flush: bool,
        can_hijack: bool,
        fail_hijack: bool,
        hijacked: bool,
        closed: Option<(Disconnect, Closed)>,
        fail_writes: bool,
        max_write: Option<usize>,
    }

    impl Recorder {
        fn hijackable() -> Self {
            Self { can_hijack: true, ..Self::default() }
        }

        fn notifying() -> Self {
            Self { closed: Some(close_signal()), ..Self::default() }
        }
    }

    impl ResponseWriter for Recorder {
        fn headers(&mut self) -> &mut HeaderMap { &mut self.headers }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
            }
            let n = self.max_write.map_or(buf.len(), |max| buf.len().min(max));
            self.body.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn write_header(&mut self, status: StatusCode) {
            self.status.get_or_insert(status);
        }

        fn flusher(&mut self) -> Option<&mut dyn Flush> {
            if self.can_flush { Some(self) } else { None }
        }

        fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
            if self.can_hijack { Some(self) } else { None }
        }

        fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> {
            if self.closed.is_some() { Some(self) } else { None }
        }
    }

    impl Flush for Recorder {
        fn flush(&mut self) { self.flushes += 1; }
    }

    impl Hijack for Recorder {
        fn hijack(&mut self) -> io::Result<Hijacked> {
            if self.fail_hijack {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "connection already closed"));
            }
            self.hijacked = true;
            Ok(Hijacked::ready(tokio::io::duplex(8).0))
        }
    }

    impl CloseNotify for Recorder {
        fn close_notify(&mut self) -> Closed {
            match &self.closed {
                Some((_, closed)) => closed.clone(),
                None => unreachable!("probe said no close notification"),
            }
        }
    }

    #[test]
    fn status_is_zero_until_something_happens() {
        let mut inner = Recorder::default();
        let w = LoggingWriter::wrap(&mut inner);
        assert_eq!(w.status(), 0);
        assert_eq!(w.size(), 0);
    }

    #[test]
    fn first_write_implies_200() {
        let mut inner = Recorder::default();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.write_all(b"hello").unwrap();
        assert_eq!(w.status(), 200);
        assert_eq!(w.size(), 5);
        drop(w);
        assert_eq!(inner.body, b"hello");
    }

    #[test]
    fn explicit_status_before_write_wins() {
        let mut inner = Recorder::default();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.write_header(StatusCode::NOT_FOUND);
        w.write_all(b"missing").unwrap();
        assert_eq!(w.status(), 404);
        drop(w);
        assert_eq!(inner.status, Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn size_sums_accepted_bytes() {
        let mut inner = Recorder { max_write: Some(4), ..Recorder::default() };
        let mut w = LoggingWriter::wrap(&mut inner);
        assert_eq!(w.write(b"0123456789").unwrap(), 4);
        w.write_all(b"abcdefghij").unwrap();
        w.write_all(b"").unwrap();
        assert_eq!(w.size(), 14);
    }

    #[test]
    fn write_errors_pass_through_untouched() {
        let mut inner = Recorder { fail_writes: true, ..Recorder::default() };
        let mut w = LoggingWriter::wrap(&mut inner);
        let err = w.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "client gone");
        assert_eq!(w.size(), 0);
    }

    #[test]
    fn headers_pass_through() {
        let mut inner = Recorder::default();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.headers().insert(http::header::CONTENT_TYPE, "text/plain".parse().unwrap());
        drop(w);
        assert_eq!(inner.headers[http::header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn flush_reaches_flushing_writers() {
        let mut inner = Recorder { can_flush: true, ..Recorder::default() };
        let mut w = LoggingWriter::wrap(&mut inner);
        w.flusher().expect("decorator always flushes").flush();
        drop(w);
        assert_eq!(inner.flushes, 1);
    }

    #[test]
    fn flush_is_a_no_op_without_support() {
        let mut inner = Recorder::default();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.flusher().expect("decorator always flushes").flush();
        drop(w);
        assert_eq!(inner.flushes, 0);
    }

    #[test]
    fn variant_matches_capabilities() {
        let mut plain = Recorder::default();
        let mut hijack = Recorder::hijackable();
        let mut notify = Recorder::notifying();
        let mut both = Recorder { can_hijack: true, ..Recorder::notifying() };

        assert!(matches!(LoggingWriter::wrap(&mut plain), LoggingWriter::Plain(_)));
        assert!(matches!(LoggingWriter::wrap(&mut hijack), LoggingWriter::Hijack(_)));
        assert!(matches!(LoggingWriter::wrap(&mut notify), LoggingWriter::CloseNotify(_)));
        assert!(matches!(LoggingWriter::wrap(&mut both), LoggingWriter::HijackCloseNotify(_)));
    }

    #[test]
    fn probes_answer_truthfully() {
        let mut plain = Recorder::default();
        let mut w = LoggingWriter::wrap(&mut plain);
        assert!(w.hijacker().is_none());
        assert!(w.close_notifier().is_none());

        let mut both = Recorder { can_hijack: true, ..Recorder::notifying() };
        let mut w = LoggingWriter::wrap(&mut both);
        assert!(w.hijacker().is_some());
        assert!(w.close_notifier().is_some());
    }

    #[test]
    fn hijack_without_support_fails_uniformly() {
        let mut inner = Recorder::notifying();
        let mut w = LoggingWriter::wrap(&mut inner);
        let err = w.hijack().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert_eq!(w.status(), 0);
    }

    #[test]
    fn successful_hijack_implies_101() {
        let mut inner = Recorder::hijackable();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.hijacker().expect("hijack exposed").hijack().unwrap();
        assert_eq!(w.status(), 101);
        drop(w);
        assert!(inner.hijacked);
    }

    #[test]
    fn hijack_implies_101_when_close_notify_is_also_offered() {
        let mut inner = Recorder { can_hijack: true, ..Recorder::notifying() };
        let mut w = LoggingWriter::wrap(&mut inner);
        assert!(matches!(w, LoggingWriter::HijackCloseNotify(_)));
        w.hijacker().expect("hijack exposed").hijack().unwrap();
        assert_eq!(w.status(), 101);
        assert!(w.close_notifier().is_some());
        drop(w);
        assert!(inner.hijacked);
    }

    #[test]
    fn hijack_keeps_an_explicit_status() {
        let mut inner = Recorder::hijackable();
        let mut w = LoggingWriter::wrap(&mut inner);
        w.write_header(StatusCode::OK);
        w.hijack().unwrap();
        assert_eq!(w.status(), 200);
    }

    #[test]
    fn failed_hijack_leaves_status_unset() {
        let mut inner = Recorder { fail_hijack: true, ..Recorder::hijackable() };
        let mut w = LoggingWriter::wrap(&mut inner);
        let err = w.hijack().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(w.status(), 0);
    }

    #[test]
    fn close_notify_passes_the_same_signal_through() {
        let mut inner = Recorder { can_hijack: true, ..Recorder::notifying() };
        let mut w = LoggingWriter::wrap(&mut inner);
        let closed = w.close_notifier().expect("close notify exposed").close_notify();
        assert!(!closed.is_closed());
        drop(w);

        if let Some((disconnect, _)) = &inner.closed {
            disconnect.fire();
        }
        assert!(closed.is_closed());
    }

    #[test]
    fn close_notify_only_writer_passes_the_signal_through() {
        let mut inner = Recorder::notifying();
        let mut w = LoggingWriter::wrap(&mut inner);
        assert!(matches!(w, LoggingWriter::CloseNotify(_)));
        assert!(w.hijacker().is_none());
        let closed = w.close_notifier().expect("close notify exposed").close_notify();
        assert!(!closed.is_closed());
        w.write_all(b"partial").unwrap();
        assert_eq!((w.status(), w.size()), (200, 7));
        drop(w);

        if let Some((disconnect, _)) = &inner.closed {
            disconnect.fire();
        }
        assert!(closed.is_closed());
    }
}
