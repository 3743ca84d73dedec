use axum::{routing::get, Router};
use std::sync::Arc;

use crate::analytics::ClickRecorder;
use crate::storage::Storage;

use super::handlers::{health_check, redirect_slug, RedirectState};

pub fn create_redirect_router(storage: Arc<dyn Storage>, recorder: Arc<ClickRecorder>) -> Router {
    let state = Arc::new(RedirectState { storage, recorder });

    Router::new()
        .route("/", get(health_check))
        .route("/{slug}", get(redirect_slug))
        .with_state(state)
}
