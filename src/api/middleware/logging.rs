use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Logs one line per request; server errors are raised to `warn`.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, "request failed");
    } else {
        info!(%method, %path, status, elapsed_ms, "request completed");
    }

    response
}
