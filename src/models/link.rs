use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A shortened link owned by a user.
///
/// `slug` is NULL only for the instant between the row insert and the slug
/// assignment inside the same transaction; rows read through the public API
/// always carry one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub owner: String,
    pub slug: Option<String>,
    pub target_url: String,
    pub is_active: bool,
    pub created_at: i64,
    pub click_count: i64,
    pub last_clicked_at: Option<i64>,
}

/// One recorded redirect, immutable once written.
///
/// Every derived field is either fully populated or NULL; empty strings are
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub clicked_at: i64,
    pub referrer_host: Option<String>,
    pub visitor_hash: Option<String>,
    pub country: Option<String>,
    pub device_category: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub engine: Option<String>,
}

/// A click event ready to be persisted.
#[derive(Debug, Clone, Default)]
pub struct NewClickEvent {
    pub link_id: i64,
    pub clicked_at: i64,
    pub referrer_host: Option<String>,
    pub visitor_hash: Option<String>,
    pub country: Option<String>,
    pub device_category: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub target_url: String,
}
