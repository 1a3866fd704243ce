//! Plain-text line loggers and the sinks they write to.
//!
//! A [`Logger`] is a prefix plus a [`LineSink`]. The request-logging
//! middleware creates one per request with the prefix `"[{request id}] "`,
//! so every line a handler prints through it can be grouped with the
//! request's start and end lines.
//!
//! Sinks decide where lines go:
//!
//! - [`Stdout`]: one line per write on standard output. The default.
//! - [`Tracing`]: each line becomes an `INFO` event on the
//!   `tsu_reqlog::request` target, for services that already run a
//!   `tracing-subscriber`.
//! - any `Fn(&str) + Send + Sync` closure, e.g. to capture lines in tests.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::request_id::RequestId;

/// Destination for finished log lines. Lines carry no trailing newline.
///
/// Sinks must not fail: a line that cannot be delivered is dropped.
pub trait LineSink: Send + Sync + 'static {
    fn write_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn write_line(&self, line: &str) {
        (self)(line)
    }
}

/// Writes lines to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stdout;

impl LineSink for Stdout {
    fn write_line(&self, line: &str) {
        // One locked write per line keeps concurrent requests from splicing
        // into each other's lines.
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

/// Forwards lines to `tracing` as `INFO` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracing;

impl LineSink for Tracing {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "tsu_reqlog::request", "{line}");
    }
}

/// A line logger with a fixed prefix.
///
/// Cheap to clone; clones share the sink.
#[derive(Clone)]
pub struct Logger {
    prefix: Arc<str>,
    sink: Arc<dyn LineSink>,
}

impl Logger {
    pub fn new(prefix: impl Into<String>, sink: Arc<dyn LineSink>) -> Self {
        Self { prefix: Arc::from(prefix.into()), sink }
    }

    /// An unprefixed logger on standard output.
    ///
    /// This is what [`logger_from_context`](crate::middleware::logger_from_context)
    /// hands out when no request logger is in scope.
    pub fn stdout() -> Self {
        Self::new("", Arc::new(Stdout))
    }

    /// A logger whose lines start with `"[{id}] "`.
    pub fn for_request(id: &RequestId, sink: Arc<dyn LineSink>) -> Self {
        Self::new(format!("[{id}] "), sink)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Writes one line: the prefix followed by `msg`.
    pub fn print(&self, msg: impl fmt::Display) {
        self.sink.write_line(&format!("{}{msg}", self.prefix));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}
