//! # tsu-reqlog
//!
//! Request logging for tsu services. Two lines per request, one id per
//! request, and a response writer that keeps every capability it had.
//!
//! ```text
//! [qZbTnKxa66f1c2d0] Handling GET /items/42 id=42
//! [qZbTnKxa66f1c2d0] looking up item            ← handler, same logger
//! [qZbTnKxa66f1c2d0] Completed GET /items/42 (200, 3ms, 17 bytes)
//! ```
//!
//! ## The pieces
//!
//! - [`Context`]: immutable, type-keyed request-scoped values. The logging
//!   middleware stores the request logger in it.
//! - [`ContextHandler`]: a handler that takes a context. Middleware wraps one
//!   in another.
//! - [`contextize`]: binds a context to a [`ContextHandler`] so the
//!   context-unaware [`Router`] can call it.
//! - [`middleware::wrap_logging`]: the logging middleware.
//! - [`middleware::LoggingWriter`]: records status and size without hiding
//!   [`Flush`], [`Hijack`] or [`CloseNotify`] support of the writer it wraps.
//! - [`Router`] and [`Server`]: a small hyper host to run it all on.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_reqlog::middleware::{logger_from_context, wrap_logging};
//! use tsu_reqlog::{contextize, Context, Params, Request, ResponseWriter, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = Context::background();
//!     let app = Router::new()
//!         .get("/items/{id}", contextize(ctx.clone(), wrap_logging(show_item)));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! fn show_item(ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, params: &Params) {
//!     let id = params.get("id").unwrap_or("unknown");
//!     logger_from_context(ctx).print(format_args!("looking up item {id}"));
//!     let _ = w.write_all(format!(r#"{{"id":"{id}"}}"#).as_bytes());
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod request_id;
mod router;
mod server;
mod transport;
mod writer;

pub mod logger;
pub mod middleware;

pub use context::{Context, ContextHandler, Contextized, contextize};
pub use error::Error;
pub use handler::Handler;
pub use http::{Method, StatusCode};
pub use logger::{LineSink, Logger};
pub use request::{Params, Request};
pub use request_id::RequestId;
pub use router::Router;
pub use server::{Server, serve_listener};
pub use writer::{
    CloseNotify, Closed, Connection, Disconnect, Flush, Hijack, Hijacked, ResponseWriter,
    close_signal,
};
