//! Request-scoped context and the adapter that binds it to routes.
//!
//! The router's handler signature has no context parameter:
//!
//! ```text
//! fn(&mut dyn ResponseWriter, &Request, &Params)
//! ```
//!
//! Middleware that wants to hand values down the chain (the request logger,
//! a deadline) needs one. [`ContextHandler`] adds it, and [`contextize`] is the
//! seam that lets a context-aware chain sit behind the router:
//!
//! ```text
//! Router ──► Contextized { ctx, handler } ──► handler(&ctx, w, req, params)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::handler::Handler;
use crate::request::{Params, Request};
use crate::writer::ResponseWriter;

// ── Context ───────────────────────────────────────────────────────────────────

/// An immutable bag of request-scoped values.
///
/// Values are keyed by their Rust type. Deriving a context with
/// [`with_value`](Context::with_value) never changes the original; the new
/// value is only visible through the returned context and its descendants.
/// Use a private newtype as the value type and no other module can collide
/// with, or even read, your entry.
///
/// Cloning is one atomic increment.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

struct Node {
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

#[derive(Clone, Copy)]
struct Deadline(Instant);

impl Context {
    /// The empty root context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that also carries `value`, shadowing any value of
    /// the same type further up the chain.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value: Box::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// The nearest value of type `T`, if any.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if let Some(v) = n.value.downcast_ref::<T>() {
                return Some(v);
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// Derives a context whose deadline is the earlier of `deadline` and the
    /// current one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        match self.deadline() {
            Some(current) if current <= deadline => self.clone(),
            _ => self.with_value(Deadline(deadline)),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.value::<Deadline>().map(|d| d.0)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline().is_some_and(|d| Instant::now() >= d)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        f.debug_struct("Context")
            .field("values", &depth)
            .field("deadline", &self.deadline())
            .finish()
    }
}

// ── ContextHandler ────────────────────────────────────────────────────────────

/// A handler that receives the request context alongside the usual
/// arguments.
///
/// Satisfied by any function or closure of the right shape:
///
/// ```rust
/// use tsu_reqlog::{Context, Params, Request, ResponseWriter};
///
/// fn show_item(_ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, params: &Params) {
///     let id = params.get("id").unwrap_or("unknown");
///     let _ = w.write_all(format!("item {id}").as_bytes());
/// }
/// ```
pub trait ContextHandler: Send + Sync + 'static {
    fn serve(&self, ctx: &Context, w: &mut dyn ResponseWriter, req: &Request, params: &Params);
}

impl<F> ContextHandler for F
where
    F: Fn(&Context, &mut dyn ResponseWriter, &Request, &Params) + Send + Sync + 'static,
{
    fn serve(&self, ctx: &Context, w: &mut dyn ResponseWriter, req: &Request, params: &Params) {
        (self)(ctx, w, req, params)
    }
}

// ── Adapter ───────────────────────────────────────────────────────────────────

/// Binds `ctx` to `handler`, producing a [`Handler`] the router accepts.
///
/// Every call forwards synchronously to `handler` with a reference to the
/// bound context and the same writer, request and params.
///
/// ```rust
/// use tsu_reqlog::{contextize, Context, Method, Params, Request, ResponseWriter, Router};
/// use tsu_reqlog::middleware::wrap_logging;
///
/// fn show_item(_ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, _p: &Params) {
///     let _ = w.write_all(b"ok");
/// }
///
/// let app = Router::new()
///     .on(Method::GET, "/items/{id}", contextize(Context::background(), wrap_logging(show_item)));
/// ```
pub fn contextize<H: ContextHandler>(ctx: Context, handler: H) -> Contextized<H> {
    Contextized { ctx, handler }
}

/// A [`ContextHandler`] with its context already bound. Built by [`contextize`].
pub struct Contextized<H> {
    ctx: Context,
    handler: H,
}

impl<H: ContextHandler> Handler for Contextized<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request, params: &Params) {
        self.handler.serve(&self.ctx, w, req, params)
    }
}
