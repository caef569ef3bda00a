//! Axum router: `POST /v1/chat/completions`, `OPTIONS` preflight, CORS,
//! a 100 MB body limit (spec §6). Out of core scope per spec §1, but
//! this is the surface that actually drives `core::pipeline`.

mod handler;
mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    Router::new()
        .route("/v1/chat/completions", post(handler::chat_completions))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
