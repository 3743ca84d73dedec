use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header::HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{ClickContext, ClickRecorder};
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub recorder: Arc<ClickRecorder>,
}

/// Resolve a slug and redirect to its target URL
///
/// Click capture runs detached from the response: the redirect has already
/// been decided when recording starts, and a capture failure is logged and
/// discarded. Unknown and deactivated slugs are indistinguishable to the
/// caller.
pub async fn redirect_slug(
    State(state): State<Arc<RedirectState>>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    match state.storage.get_active_by_slug(&slug).await {
        Ok(Some(link)) => {
            let ctx = ClickContext::from_request(&headers, Some(addr.ip()));
            let recorder = Arc::clone(&state.recorder);
            let target = link.target_url.clone();

            tokio::spawn(async move {
                if let Err(err) = recorder.record(&link, &ctx).await {
                    tracing::warn!(slug = %slug, error = %err, "failed to record click");
                }
            });

            Redirect::temporary(&target).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            tracing::error!(slug = %slug, error = %err, "slug lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
