pub mod health;
pub mod sessions;

use axum::http::{header, Method};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::middleware::request_logger;
use crate::api::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.config.cors.allowed_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/api/v1",
            api_v1_routes(state.config.config.server.max_document_bytes),
        )
        .layer(middleware::from_fn(request_logger))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

/// Room for JSON escaping around a document at the size limit.
fn document_body_limit(max_document_bytes: usize) -> usize {
    max_document_bytes.saturating_mul(2).saturating_add(64 * 1024)
}

fn api_v1_routes(max_document_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/sessions/{id}/documents",
            post(sessions::process_document)
                .layer(DefaultBodyLimit::max(document_body_limit(max_document_bytes))),
        )
        .route("/sessions/{id}/ask", post(sessions::ask))
        .route(
            "/sessions/{id}/history",
            get(sessions::history).delete(sessions::clear_history),
        )
        .route("/sessions/{id}/reset", post(sessions::reset))
}
