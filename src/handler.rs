//! Route handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers of *different* concrete types (plain functions,
//! closures, [`Contextized`](crate::Contextized) chains) in one
//! `HashMap<Method, Tree>`. [`Handler`] is object-safe, so every registration
//! is boxed once into a [`BoxedHandler`] and stored uniformly:
//!
//! ```text
//! fn health(w, req, params) { … }                 ← user writes this
//!        ↓ router.get("/healthz", health)
//! Arc::new(health) as Arc<dyn Handler>            ← BoxedHandler
//!        ↓  cloned out of the tree per request
//! handler.serve(&mut writer, &req, &params)       ← one vtable dispatch
//! ```
//!
//! Handlers are synchronous. The server runs each one on tokio's blocking
//! pool, so a handler may block on I/O without stalling other connections.

use std::sync::Arc;

use crate::request::{Params, Request};
use crate::writer::ResponseWriter;

/// A route handler as the router sees it: no context, just the writer, the
/// request and the matched path parameters.
///
/// Implemented for every function or closure with the signature
///
/// ```text
/// fn(&mut dyn ResponseWriter, &Request, &Params)
/// ```
///
/// and for [`Contextized`](crate::Contextized), which is how context-aware
/// middleware chains reach the router.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request, params: &Params);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &Request, &Params) + Send + Sync + 'static,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request, params: &Params) {
        (self)(w, req, params)
    }
}

/// A type-erased handler shared across concurrent requests.
///
/// `Arc` gives cheap, thread-safe shared ownership: one atomic increment per
/// request to move the handler onto the blocking pool.
pub(crate) type BoxedHandler = Arc<dyn Handler>;
