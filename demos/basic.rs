//! Minimal tsu-reqlog example: logged JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/items/42
//!   curl -X DELETE http://localhost:3000/items/42
//!   curl http://localhost:3000/healthz
//!
//! Request lines go to stdout; server diagnostics go through tracing.

use tsu_reqlog::middleware::{RequestLogging, logger_from_context, wrap_logging};
use tsu_reqlog::logger::Tracing;
use tsu_reqlog::{
    Context, Params, Request, ResponseWriter, Router, Server, StatusCode, contextize,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ctx = Context::background();
    let app = Router::new()
        .get("/items/{id}", contextize(ctx.clone(), wrap_logging(get_item)))
        .delete("/items/{id}", contextize(ctx.clone(), wrap_logging(delete_item)))
        // Health checks log through tracing instead, so they can be filtered out.
        .get("/healthz", contextize(ctx, RequestLogging::new().sink(Tracing).wrap(healthz)));

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /items/{id}
fn get_item(ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, params: &Params) {
    let id = params.get("id").unwrap_or("unknown");
    logger_from_context(ctx).print(format_args!("loading item {id}"));

    w.headers().insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    if let Err(e) = w.write_all(format!(r#"{{"id":"{id}","name":"widget"}}"#).as_bytes()) {
        logger_from_context(ctx).print(format_args!("write failed: {e}"));
    }
}

// DELETE /items/{id} → 204 No Content
fn delete_item(_ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, _params: &Params) {
    w.write_header(StatusCode::NO_CONTENT);
}

fn healthz(_ctx: &Context, w: &mut dyn ResponseWriter, _req: &Request, _params: &Params) {
    let _ = w.write_all(b"ok");
}
