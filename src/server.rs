//! HTTP server and graceful shutdown.
//!
//! # Request lifecycle
//!
//! 1. hyper parses the request; the router picks a [`Handler`](crate::Handler).
//! 2. The body is collected, so handlers see a complete [`Request`].
//! 3. The handler runs on tokio's blocking pool with a fresh transport
//!    [`ResponseWriter`](crate::ResponseWriter). Handlers are synchronous and
//!    may block.
//! 4. Whatever the handler wrote becomes the response.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{StatusCode, Version};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::router::Router;
use crate::transport::TransportWriter;
use crate::writer::{close_signal, Disconnect};

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tsu_reqlog::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but shuts down when `signal` resolves
    /// instead of on SIGTERM / Ctrl-C.
    pub async fn serve_with_shutdown<S>(self, router: Router, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| Error::Bind { addr: self.addr, source })?;
        serve_listener(listener, router, signal).await
    }
}

/// Serves `router` on an already bound listener until `signal` resolves,
/// then drains in-flight connections.
///
/// Useful when the port is chosen by the OS (`127.0.0.1:0`) and the caller
/// needs to know it before serving starts.
pub async fn serve_listener<S>(listener: TcpListener, router: Router, signal: S) -> Result<(), Error>
where
    S: Future<Output = ()>,
{
    let local_addr = listener.local_addr()?;

    // Wrap router in Arc so it can be shared across concurrent connection
    // tasks without copying the entire routing table.
    let router = Arc::new(router);

    info!(addr = %local_addr, "tsu listening");

    // JoinSet tracks every spawned connection task so we can wait for
    // them all to finish during graceful shutdown.
    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Check shutdown first so a signal immediately stops accepting
            // new connections, even if more are queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection, not once
                    // per connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { dispatch(router, req, remote_addr).await }
                    });

                    // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                    // Upgrades must stay enabled for hijacking to work.
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Drain: wait for every in-flight connection to finish before we return.
    while tasks.join_next().await.is_some() {}

    info!("tsu stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response.
///
/// The error type is [`Infallible`]: every failure becomes a status code
/// (404, 400, 500) so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    mut req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Some((handler, params)) = router.lookup(req.method(), req.uri().path()) else {
        return Ok(status_only(StatusCode::NOT_FOUND));
    };

    // Only HTTP/1.x connections can be upgraded; HTTP/2 writers must not
    // offer hijacking at all.
    let upgrade = (req.version() <= Version::HTTP_11).then(|| hyper::upgrade::on(&mut req));
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };
    let request = Request::from_parts(parts, body, remote_addr);

    let (disconnect, closed) = close_signal();
    let guard = DisconnectGuard(Some(disconnect));
    let writer = TransportWriter::new(upgrade, closed);

    let outcome = tokio::task::spawn_blocking(move || {
        let mut writer = writer;
        handler.serve(&mut writer, &request, &params);
        writer
    })
    .await;
    guard.disarm();

    match outcome {
        Ok(writer) => Ok(writer.into_response()),
        Err(e) => {
            error!(peer = %remote_addr, "handler failed: {e}");
            Ok(status_only(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn status_only(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Fires the request's close notification if the dispatch future is dropped
/// before the handler finishes, i.e. when hyper abandons the request because
/// the client went away.
struct DisconnectGuard(Option<Disconnect>);

impl DisconnectGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(disconnect) = self.0.take() {
            debug!("request abandoned before the handler finished");
            disconnect.fire();
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` is a future that never resolves, so on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
