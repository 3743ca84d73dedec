use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    create_link, dashboard, health_check, link_stats, list_links, update_link_status, AppState,
};
use super::identity::identity_middleware;

pub fn create_api_router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/links", post(create_link).get(list_links))
        .route("/links/{id}/stats", get(link_stats))
        .route("/links/{id}/status", patch(update_link_status))
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(identity_middleware))
        .with_state(state);

    let api = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
