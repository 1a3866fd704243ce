//! Middleware layer.
//!
//! Middleware wraps a [`ContextHandler`](crate::ContextHandler) in another
//! one with the same signature, so layers stack in any order and the router
//! never knows they are there.
//!
//! Built-in middleware:
//! - [`wrap_logging`] / [`RequestLogging`]: a request id, a request-scoped
//!   logger in the context, and one start and one end line per request.
//!
//! [`LoggingWriter`] is public for middleware of your own that needs to know
//! the final status or body size.

mod logging;
mod response_logger;

pub use logging::{
    LoggingHandler, RequestLogging, logger_from_context, logger_from_context_or, wrap_logging,
};
pub use response_logger::{
    CloseNotifyLogger, HijackCloseNotifyLogger, HijackLogger, LoggingWriter, ResponseLogger,
};
