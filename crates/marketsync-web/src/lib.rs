//! # Marketsync Web
//!
//! HTTP trigger for enrichment runs.
//!
//! | Route | Methods | Description |
//! |-------|---------|-------------|
//! | `/api/v1/sync/peers` | `POST` | Run the peers job |
//! | `/api/v1/sync/watchlist` | `POST` | Run the watchlist job |
//! | `/health` | `GET` | Liveness probe |
//!
//! `OPTIONS` preflights get CORS headers from the CORS layer. Any other
//! method on a sync route answers `405` with the allowed methods.

mod handlers;
mod responses;
mod routes;

pub use handlers::AppState;
pub use responses::{ErrorResponse, SummaryBody, SyncResponse};
pub use routes::create_router;

/// Binds `addr` and serves the router until the process stops.
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "marketsync trigger listening");
    axum::serve(listener, create_router(state)).await
}
