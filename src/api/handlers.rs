use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::analytics::engine::epoch_to_iso;
use crate::analytics::{AggregationEngine, Granularity, Window};
use crate::models::{ClickEvent, CreateLinkRequest, Link};
use crate::storage::{Storage, StorageError};

use super::identity::Identity;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub engine: AggregationEngine,
    pub public_base_url: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// A link as returned by the management API.
#[derive(Serialize)]
pub struct LinkResponse {
    pub id: i64,
    pub slug: Option<String>,
    pub short_url: Option<String>,
    pub target_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub click_count: i64,
    pub last_clicked_at: Option<String>,
}

impl LinkResponse {
    fn from_link(link: Link, base_url: &str) -> Self {
        let short_url = link.slug.as_ref().map(|slug| format!("{}/{}", base_url, slug));
        Self {
            id: link.id,
            short_url,
            slug: link.slug,
            target_url: link.target_url,
            is_active: link.is_active,
            created_at: epoch_to_iso(link.created_at),
            click_count: link.click_count,
            last_clicked_at: link.last_clicked_at.map(epoch_to_iso),
        }
    }
}

#[derive(Serialize)]
pub struct ClickEventItem {
    pub id: i64,
    pub clicked_at: String,
    pub referrer_host: Option<String>,
    pub country: Option<String>,
    pub device_category: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub engine: Option<String>,
}

impl From<ClickEvent> for ClickEventItem {
    fn from(event: ClickEvent) -> Self {
        Self {
            id: event.id,
            clicked_at: epoch_to_iso(event.clicked_at),
            referrer_host: event.referrer_host,
            country: event.country,
            device_category: event.device_category,
            browser_name: event.browser_name,
            browser_version: event.browser_version,
            os_name: event.os_name,
            os_version: event.os_version,
            engine: event.engine,
        }
    }
}

#[derive(Serialize)]
pub struct LinkStatsResponse {
    pub link: LinkResponse,
    pub clicks_last_24h: i64,
    pub unique_visitors: i64,
    pub recent_clicks: Vec<ClickEventItem>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub start_date: String,
    pub end_date: String,
}

/// Create a new shortened link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner)): Extension<Identity>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), (StatusCode, Json<ErrorResponse>)> {
    validate_target_url(&payload.target_url)?;

    match state.storage.create_link(&owner, &payload.target_url).await {
        Ok(link) => Ok((
            StatusCode::CREATED,
            Json(LinkResponse::from_link(link, &state.public_base_url)),
        )),
        Err(StorageError::Conflict) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Short code already exists".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to create link: {}", e),
            }),
        )),
    }
}

fn validate_target_url(raw: &str) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let parsed = Url::parse(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "target_url must be a valid absolute URL".to_string(),
            }),
        )
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "target_url must use http or https".to_string(),
            }),
        ));
    }

    Ok(())
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner)): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LinkResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    match state.storage.list_links(&owner, limit, offset).await {
        Ok(links) => Ok(Json(
            links
                .into_iter()
                .map(|link| LinkResponse::from_link(link, &state.public_base_url))
                .collect(),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to list links: {}", e),
            }),
        )),
    }
}

/// Per-link statistics: recent activity plus unique visitors
pub async fn link_stats(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner)): Extension<Identity>,
    Path(link_id): Path<i64>,
) -> Result<Json<LinkStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let link = match state.storage.get_link_for_owner(&owner, link_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return Err(not_found()),
        Err(e) => return Err(internal(e)),
    };

    let now = chrono::Utc::now().timestamp();
    let last_24h = Window::new(now - 86_400, now).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to compute stats window".to_string(),
            }),
        )
    })?;

    let clicks_last_24h = state
        .storage
        .count_clicks_for_link(link.id, Some(last_24h))
        .await
        .map_err(internal)?;
    let unique_visitors = state
        .storage
        .unique_visitors_for_link(link.id, None)
        .await
        .map_err(internal)?;
    let recent = state
        .storage
        .recent_clicks(link.id, 50)
        .await
        .map_err(internal)?;

    Ok(Json(LinkStatsResponse {
        link: LinkResponse::from_link(link, &state.public_base_url),
        clicks_last_24h,
        unique_visitors,
        recent_clicks: recent.into_iter().map(ClickEventItem::from).collect(),
    }))
}

/// Toggle a link's active flag
pub async fn update_link_status(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner)): Extension<Identity>,
    Path(link_id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<LinkResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state
        .storage
        .set_link_active(&owner, link_id, query.is_active)
        .await
    {
        Ok(Some(link)) => Ok(Json(LinkResponse::from_link(link, &state.public_base_url))),
        Ok(None) => Err(not_found()),
        Err(e) => Err(internal(e)),
    }
}

/// Dashboard analytics for the caller over a required date range
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner)): Extension<Identity>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<crate::analytics::models::DashboardData>, (StatusCode, Json<ErrorResponse>)> {
    let start = parse_iso_datetime(&query.start_date).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid start_date: {}", query.start_date),
            }),
        )
    })?;
    let end = parse_iso_datetime(&query.end_date).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid end_date: {}", query.end_date),
            }),
        )
    })?;

    let window = Window::new(start, end).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    // Bucket width tracks the window size; the engine takes it as given.
    let granularity = Granularity::for_window(&window);

    match state.engine.dashboard(&owner, window, granularity).await {
        Ok(data) => Ok(Json(data)),
        Err(e) => Err(internal(e)),
    }
}

/// Accept RFC 3339 ("2024-01-01T00:00:00Z") or a naive ISO datetime, which
/// is taken to be UTC.
fn parse_iso_datetime(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    // Missing, inactive, and foreign links all read the same.
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Link not found".to_string(),
        }),
    )
}

fn internal(e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_datetime() {
        assert_eq!(parse_iso_datetime("1970-01-01T00:00:00Z"), Some(0));
        assert_eq!(parse_iso_datetime("1970-01-01T00:00:00+00:00"), Some(0));
        assert_eq!(parse_iso_datetime("1970-01-01T01:00:00"), Some(3_600));
        assert_eq!(parse_iso_datetime("not-a-date"), None);
        assert_eq!(parse_iso_datetime(""), None);
    }

    #[test]
    fn test_validate_target_url() {
        assert!(validate_target_url("https://example.com/page").is_ok());
        assert!(validate_target_url("http://example.com").is_ok());
        assert!(validate_target_url("ftp://example.com").is_err());
        assert!(validate_target_url("not a url").is_err());
        assert!(validate_target_url("").is_err());
    }
}
