use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{health_check, method_not_allowed, sync_peers, sync_watchlist, AppState};

/// Builds the trigger router. `OPTIONS` requests are answered by the CORS
/// layer before they reach a route.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/sync/peers",
            post(sync_peers).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/sync/watchlist",
            post(sync_watchlist).fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}
