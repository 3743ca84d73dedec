use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::models::{CountrySlice, Granularity, SeriesPoint, Window};
use crate::models::{ClickEvent, Link, NewClickEvent};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("slug already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Data-access boundary shared by both SQL dialects.
///
/// Aggregate queries take an optional half-open [`Window`]; `None` means
/// all-time. Time-series bucketing is the one operation the two dialects
/// implement differently (native `date_trunc` vs. string-based `strftime`),
/// but both return the same epoch-second bucket representation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Insert a link and assign its slug from the freshly issued row id,
    /// as a single transaction.
    async fn create_link(&self, owner: &str, target_url: &str) -> StorageResult<Link>;

    /// Fetch a link by public slug, active links only. Missing and inactive
    /// are indistinguishable to the caller.
    async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Link>>;

    /// Fetch a link by id, scoped to its owner. Foreign links read as absent.
    async fn get_link_for_owner(&self, owner: &str, link_id: i64) -> Result<Option<Link>>;

    /// List an owner's links, newest first.
    async fn list_links(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Link>>;

    /// Toggle a link's active flag, scoped to its owner.
    async fn set_link_active(
        &self,
        owner: &str,
        link_id: i64,
        is_active: bool,
    ) -> Result<Option<Link>>;

    /// Persist one click event and bump the owning link's denormalized
    /// counters. Commits as a single transaction: either both apply or
    /// neither does, and the increment is applied SQL-side so concurrent
    /// clicks never lose counts.
    async fn record_click(&self, event: &NewClickEvent) -> Result<()>;

    /// Most recent click events for a link, newest first.
    async fn recent_clicks(&self, link_id: i64, limit: i64) -> Result<Vec<ClickEvent>>;

    /// Click count for one link, optionally windowed.
    async fn count_clicks_for_link(&self, link_id: i64, window: Option<Window>) -> Result<i64>;

    /// Distinct non-null visitor hashes for one link, optionally windowed.
    async fn unique_visitors_for_link(&self, link_id: i64, window: Option<Window>) -> Result<i64>;

    /// Number of links the owner has, independent of any window.
    async fn total_links(&self, owner: &str) -> Result<i64>;

    /// Clicks across all of the owner's links. Windowed counts come from the
    /// event log; the all-time count falls back to the denormalized per-link
    /// counters.
    async fn total_clicks(&self, owner: &str, window: Option<Window>) -> Result<i64>;

    /// Distinct non-null visitor hashes across all of the owner's links.
    async fn unique_visitors(&self, owner: &str, window: Option<Window>) -> Result<i64>;

    /// Distinct non-null visitor hashes per link, keyed by link id.
    async fn unique_visitors_by_link(
        &self,
        owner: &str,
        window: Option<Window>,
    ) -> Result<HashMap<i64, i64>>;

    /// Click and unique-visitor counts grouped by country, non-null
    /// countries only, ordered by clicks descending.
    async fn clicks_by_country(
        &self,
        owner: &str,
        window: Option<Window>,
    ) -> Result<Vec<CountrySlice>>;

    /// Click counts bucketed at the requested granularity, chronological.
    async fn clicks_time_series(
        &self,
        owner: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<SeriesPoint>>;
}
