//! Per-request start/end logging with a request-scoped logger.
//!
//! Every request through [`LoggingHandler`] produces two lines sharing one
//! request-id prefix:
//!
//! ```text
//! [qZbTnKxa66f1c2d0] Handling GET /items/42 id=42
//! [qZbTnKxa66f1c2d0] Completed GET /items/42 (200, 3ms, 17 bytes)
//! ```
//!
//! Handlers further down the chain print through the same logger with
//! [`logger_from_context`], so their lines carry the prefix too.
//!
//! If the inner handler panics the panic is not caught here and the
//! `Completed` line is never written.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::{Context, ContextHandler};
use crate::logger::{LineSink, Logger, Stdout};
use crate::request::{Params, Request};
use crate::request_id::RequestId;
use crate::writer::ResponseWriter;

use super::response_logger::LoggingWriter;

/// Context key for the request logger. Private, so nothing else can read or
/// overwrite the entry.
#[derive(Clone)]
struct RequestLogger(Logger);

/// Configuration for the logging middleware.
///
/// ```rust
/// use tsu_reqlog::logger::Tracing;
/// use tsu_reqlog::middleware::RequestLogging;
/// use tsu_reqlog::{Context, Params, Request, ResponseWriter};
///
/// fn handler(_: &Context, _: &mut dyn ResponseWriter, _: &Request, _: &Params) {}
///
/// let logged = RequestLogging::new().sink(Tracing).wrap(handler);
/// ```
#[derive(Clone)]
pub struct RequestLogging {
    sink: Arc<dyn LineSink>,
}

impl RequestLogging {
    /// Logs to standard output.
    pub fn new() -> Self {
        Self { sink: Arc::new(Stdout) }
    }

    /// Sends request lines to `sink` instead of standard output.
    pub fn sink(mut self, sink: impl LineSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn wrap<H: ContextHandler>(&self, handler: H) -> LoggingHandler<H> {
        LoggingHandler { handler, sink: Arc::clone(&self.sink) }
    }
}

impl Default for RequestLogging {
    fn default() -> Self { Self::new() }
}

/// Wraps `handler` with request logging to standard output.
pub fn wrap_logging<H: ContextHandler>(handler: H) -> LoggingHandler<H> {
    RequestLogging::new().wrap(handler)
}

/// A [`ContextHandler`] that logs around the one it wraps.
pub struct LoggingHandler<H> {
    handler: H,
    sink: Arc<dyn LineSink>,
}

impl<H: ContextHandler> ContextHandler for LoggingHandler<H> {
    fn serve(&self, ctx: &Context, w: &mut dyn ResponseWriter, req: &Request, params: &Params) {
        let mut logging_w = LoggingWriter::wrap(w);

        let logger = Logger::for_request(&RequestId::generate(), Arc::clone(&self.sink));
        let ctx = ctx.with_value(RequestLogger(logger.clone()));

        let start = Instant::now();
        write_start_line(&logger, req, params);

        self.handler.serve(&ctx, &mut logging_w, req, params);

        write_end_line(&logger, req, logging_w.status(), logging_w.size(), start.elapsed());
    }
}

/// The request logger stored by [`LoggingHandler`], or an unprefixed stdout
/// logger when `ctx` did not come through it.
pub fn logger_from_context(ctx: &Context) -> Logger {
    match ctx.value::<RequestLogger>() {
        Some(RequestLogger(logger)) => logger.clone(),
        None => Logger::stdout(),
    }
}

/// Like [`logger_from_context`], but falls back to `default`.
pub fn logger_from_context_or(ctx: &Context, default: &Logger) -> Logger {
    match ctx.value::<RequestLogger>() {
        Some(RequestLogger(logger)) => logger.clone(),
        None => default.clone(),
    }
}

fn write_start_line(logger: &Logger, req: &Request, params: &Params) {
    if params.is_empty() {
        logger.print(format_args!("Handling {} {}", req.method(), req.target()));
    } else {
        logger.print(format_args!("Handling {} {} {params}", req.method(), req.target()));
    }
}

fn write_end_line(logger: &Logger, req: &Request, status: u16, size: usize, elapsed: Duration) {
    logger.print(format_args!(
        "Completed {} {} ({status}, {}ms, {size} bytes)",
        req.method(),
        req.target(),
        elapsed.as_millis(),
    ));
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use http::{HeaderMap, Method, StatusCode, Uri};

    use super::*;

    #[derive(Default)]
    struct Buffer {
        headers: HeaderMap,
        status: Option<StatusCode>,
        body: Vec<u8>,
    }

    impl ResponseWriter for Buffer {
        fn headers(&mut self) -> &mut HeaderMap { &mut self.headers }
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn write_header(&mut self, status: StatusCode) {
            self.status.get_or_insert(status);
        }
    }

    fn capture() -> (Arc<Mutex<Vec<String>>>, RequestLogging) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let config = RequestLogging::new()
            .sink(move |line: &str| captured.lock().unwrap().push(line.to_owned()));
        (lines, config)
    }

    /// Splits `"[id] rest"` into `("id", "rest")`.
    fn split_prefix(line: &str) -> (&str, &str) {
        let rest = line.strip_prefix('[').expect("prefixed line");
        rest.split_once("] ").expect("closing bracket")
    }

    fn seventeen_bytes(_: &Context, w: &mut dyn ResponseWriter, _: &Request, _: &Params) {
        w.write_all(b"{\"id\":42,\"ok\":1}\n").unwrap();
    }

    fn not_found(_: &Context, w: &mut dyn ResponseWriter, _: &Request, _: &Params) {
        w.write_header(StatusCode::NOT_FOUND);
    }

    fn greet(ctx: &Context, _: &mut dyn ResponseWriter, _: &Request, _: &Params) {
        logger_from_context(ctx).print("looking up item");
    }

    #[test]
    fn logs_start_and_end_lines() {
        let (lines, config) = capture();
        let handler = config.wrap(seventeen_bytes);
        let req = Request::new(Method::GET, Uri::from_static("/items/42"));
        let params: Params = [("id", "42")].into_iter().collect();

        let mut w = Buffer::default();
        handler.serve(&Context::background(), &mut w, &req, &params);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        let (start_id, start) = split_prefix(&lines[0]);
        let (end_id, end) = split_prefix(&lines[1]);
        assert_eq!(start_id, end_id);
        assert_eq!(start, "Handling GET /items/42 id=42");
        assert!(end.starts_with("Completed GET /items/42 (200, "), "{end}");
        assert!(end.ends_with("ms, 17 bytes)"), "{end}");
        assert_eq!(w.body.len(), 17);
    }

    #[test]
    fn explicit_status_without_body() {
        let (lines, config) = capture();
        let handler = config.wrap(not_found);
        let req = Request::new(Method::DELETE, Uri::from_static("/items/7?force=true"));

        handler.serve(&Context::background(), &mut Buffer::default(), &req, &Params::new());

        let lines = lines.lock().unwrap();
        assert_eq!(split_prefix(&lines[0]).1, "Handling DELETE /items/7?force=true");
        let end = split_prefix(&lines[1]).1;
        assert!(end.starts_with("Completed DELETE /items/7?force=true (404, "), "{end}");
        assert!(end.ends_with("ms, 0 bytes)"), "{end}");
    }

    #[test]
    fn absolute_uris_log_path_and_query() {
        let (lines, config) = capture();
        let handler = config.wrap(seventeen_bytes);
        let req = Request::new(Method::GET, Uri::from_static("http://127.0.0.1:3000/items/42?full=1"));
        let params: Params = [("id", "42")].into_iter().collect();

        handler.serve(&Context::background(), &mut Buffer::default(), &req, &params);

        let lines = lines.lock().unwrap();
        assert_eq!(split_prefix(&lines[0]).1, "Handling GET /items/42?full=1 id=42");
        let end = split_prefix(&lines[1]).1;
        assert!(end.starts_with("Completed GET /items/42?full=1 (200, "), "{end}");
    }

    #[test]
    fn handler_lines_share_the_request_prefix() {
        let (lines, config) = capture();
        let handler = config.wrap(greet);
        let req = Request::new(Method::GET, Uri::from_static("/"));

        handler.serve(&Context::background(), &mut Buffer::default(), &req, &Params::new());

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        let ids: Vec<_> = lines.iter().map(|l| split_prefix(l).0).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]), "{ids:?}");
        assert_eq!(split_prefix(&lines[1]).1, "looking up item");
    }

    #[test]
    fn each_request_gets_its_own_id() {
        let (lines, config) = capture();
        let handler = config.wrap(seventeen_bytes);
        let req = Request::new(Method::GET, Uri::from_static("/"));
        for _ in 0..2 {
            handler.serve(&Context::background(), &mut Buffer::default(), &req, &Params::new());
        }

        let lines = lines.lock().unwrap();
        assert_ne!(split_prefix(&lines[0]).0, split_prefix(&lines[2]).0);
    }

    #[test]
    fn caller_context_is_not_modified() {
        let (_lines, config) = capture();
        let handler = config.wrap(greet);
        let ctx = Context::background();
        let req = Request::new(Method::GET, Uri::from_static("/"));

        handler.serve(&ctx, &mut Buffer::default(), &req, &Params::new());

        assert_eq!(logger_from_context(&ctx).prefix(), "");
    }

    #[test]
    fn inner_handler_sees_the_decorated_writer() {
        fn probe(_: &Context, w: &mut dyn ResponseWriter, _: &Request, _: &Params) {
            // The plain buffer cannot flush; the decorator still offers a no-op flush.
            assert!(w.flusher().is_some());
            assert!(w.hijacker().is_none());
        }
        let (_lines, config) = capture();
        let req = Request::new(Method::GET, Uri::from_static("/"));
        config.wrap(probe).serve(&Context::background(), &mut Buffer::default(), &req, &Params::new());
    }

    #[test]
    fn fallback_logger_outside_the_middleware() {
        let ctx = Context::background();
        let logger = logger_from_context(&ctx);
        assert_eq!(logger.prefix(), "");
        logger.print("still works");

        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let default = Logger::new("[boot] ", Arc::new(move |line: &str| {
            captured.lock().unwrap().push(line.to_owned())
        }));
        logger_from_context_or(&ctx, &default).print("configured default");
        assert_eq!(*lines.lock().unwrap(), ["[boot] configured default"]);
    }
}
