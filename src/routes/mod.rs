pub mod accounts;
pub mod comments;
pub mod feed;
pub mod follows;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod users;

use crate::{
    state::AppState,
    utils::middleware::{auth_middleware, rate_limit_middleware, request_id_middleware},
};
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Every API route, relative to `/api`.
fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(accounts::router())
        .merge(users::router())
        .merge(follows::router())
        .merge(feed::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(notifications::router())
}

/// Builds the full application with its middleware stack. Layers run
/// outermost first: tracing, compression, CORS, request id, rate limit, auth.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(origins)
}
