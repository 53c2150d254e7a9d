//! API layer - HTTP handlers and routing
//!
//! - Public HTML views and the contact form
//! - JSON content API under `/api/v1`
//! - Moderation API under `/api/v1/admin`
//! - Embedded static assets under `/static/`

pub mod admin;
pub mod common;
pub mod contact;
pub mod content;
pub mod middleware;
pub mod responses;
pub mod site;
pub mod static_files;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, ClientIp};

/// Build the JSON API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::require_admin,
    ));

    content::router().nest("/admin", admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(site::router())
        .merge(contact::router())
        .route("/static/{*path}", get(static_files::serve_static))
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(site::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
