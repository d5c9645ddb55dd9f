use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes — no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes — require a bearer token when one is configured
    let protected = Router::new()
        // Predictions
        .route("/api/predictions", post(handlers::predictions::create))
        .route(
            "/api/predictions/:id",
            get(handlers::predictions::detail).delete(handlers::predictions::remove),
        )
        .route("/api/predictions/:id/quote", get(handlers::quotes::quote))
        .route("/api/predictions/:id/close", post(handlers::predictions::close))
        .route("/api/predictions/:id/settle", post(handlers::predictions::settle))
        .route("/api/predictions/:id/cancel", post(handlers::predictions::cancel))
        .route("/api/predictions/:id/dispute", post(handlers::predictions::dispute))
        .route("/api/predictions/:id/resolve", post(handlers::predictions::resolve))
        // Entries
        .route("/api/predictions/:id/entries", post(handlers::entries::place))
        .route("/api/entries/:id/refund", post(handlers::entries::refund))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // CORS: the mobile client is proxied from the same origin; direct API
    // access needs the bearer token.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
