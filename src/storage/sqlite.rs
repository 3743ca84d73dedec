use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::analytics::models::{CountrySlice, Granularity, SeriesPoint, Window};
use crate::models::{ClickEvent, Link, NewClickEvent};
use crate::slug::slug_for_id;
use crate::storage::{Storage, StorageError, StorageResult};

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn window_bounds(window: Option<Window>) -> (Option<i64>, Option<i64>) {
    match window {
        Some(w) => (Some(w.start), Some(w.end)),
        None => (None, None),
    }
}

fn map_conflict(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Other(e.into()),
    }
}

const LINK_COLUMNS: &str =
    "id, owner, slug, target_url, is_active, created_at, click_count, last_clicked_at";

const CLICK_COLUMNS: &str = "id, link_id, clicked_at, referrer_host, visitor_hash, country, \
     device_category, browser_name, browser_version, os_name, os_version, engine";

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                slug TEXT UNIQUE,
                target_url TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                click_count INTEGER NOT NULL DEFAULT 0,
                last_clicked_at INTEGER
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner_created ON links(owner, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                clicked_at INTEGER NOT NULL,
                referrer_host TEXT,
                visitor_hash TEXT,
                country TEXT,
                device_category TEXT,
                browser_name TEXT,
                browser_version TEXT,
                os_name TEXT,
                os_version TEXT,
                engine TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_click_events_link_clicked \
             ON click_events(link_id, clicked_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_click_events_clicked ON click_events(clicked_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_link(&self, owner: &str, target_url: &str) -> StorageResult<Link> {
        let created_at = Utc::now().timestamp();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        let result = sqlx::query(
            "INSERT INTO links (owner, target_url, is_active, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(owner)
        .bind(target_url)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        let id = result.last_insert_rowid();
        let slug = slug_for_id(id)?;

        sqlx::query("UPDATE links SET slug = ? WHERE id = ?")
            .bind(&slug)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_conflict)?;

        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        tx.commit().await.map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE slug = ? AND is_active = 1"
        ))
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn get_link_for_owner(&self, owner: &str, link_id: i64) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = ? AND owner = ?"
        ))
        .bind(link_id)
        .bind(owner)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE owner = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn set_link_active(
        &self,
        owner: &str,
        link_id: i64,
        is_active: bool,
    ) -> Result<Option<Link>> {
        let result = sqlx::query("UPDATE links SET is_active = ? WHERE id = ? AND owner = ?")
            .bind(is_active)
            .bind(link_id)
            .bind(owner)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_link_for_owner(owner, link_id).await
    }

    async fn record_click(&self, event: &NewClickEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO click_events (
                link_id, clicked_at, referrer_host, visitor_hash, country,
                device_category, browser_name, browser_version, os_name, os_version, engine
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.link_id)
        .bind(event.clicked_at)
        .bind(&event.referrer_host)
        .bind(&event.visitor_hash)
        .bind(&event.country)
        .bind(&event.device_category)
        .bind(&event.browser_name)
        .bind(&event.browser_version)
        .bind(&event.os_name)
        .bind(&event.os_version)
        .bind(&event.engine)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE links SET click_count = click_count + 1, last_clicked_at = ? WHERE id = ?",
        )
        .bind(event.clicked_at)
        .bind(event.link_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn recent_clicks(&self, link_id: i64, limit: i64) -> Result<Vec<ClickEvent>> {
        let events = sqlx::query_as::<_, ClickEvent>(&format!(
            "SELECT {CLICK_COLUMNS} FROM click_events WHERE link_id = ? \
             ORDER BY clicked_at DESC, id DESC LIMIT ?"
        ))
        .bind(link_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }

    async fn count_clicks_for_link(&self, link_id: i64, window: Option<Window>) -> Result<i64> {
        let (start, end) = window_bounds(window);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM click_events
            WHERE link_id = ?1
              AND (?2 IS NULL OR clicked_at >= ?2)
              AND (?3 IS NULL OR clicked_at < ?3)
            "#,
        )
        .bind(link_id)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn unique_visitors_for_link(&self, link_id: i64, window: Option<Window>) -> Result<i64> {
        let (start, end) = window_bounds(window);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT visitor_hash) FROM click_events
            WHERE link_id = ?1
              AND (?2 IS NULL OR clicked_at >= ?2)
              AND (?3 IS NULL OR clicked_at < ?3)
            "#,
        )
        .bind(link_id)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn total_links(&self, owner: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM links WHERE owner = ?")
            .bind(owner)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn total_clicks(&self, owner: &str, window: Option<Window>) -> Result<i64> {
        let count = match window {
            Some(window) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM click_events e
                    JOIN links l ON l.id = e.link_id
                    WHERE l.owner = ?1 AND e.clicked_at >= ?2 AND e.clicked_at < ?3
                    "#,
                )
                .bind(owner)
                .bind(window.start)
                .bind(window.end)
                .fetch_one(self.pool.as_ref())
                .await?
            }
            None => {
                // All-time totals come from the denormalized counters.
                sqlx::query_scalar::<_, i64>(
                    "SELECT COALESCE(SUM(click_count), 0) FROM links WHERE owner = ?",
                )
                .bind(owner)
                .fetch_one(self.pool.as_ref())
                .await?
            }
        };

        Ok(count)
    }

    async fn unique_visitors(&self, owner: &str, window: Option<Window>) -> Result<i64> {
        let (start, end) = window_bounds(window);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT e.visitor_hash) FROM click_events e
            JOIN links l ON l.id = e.link_id
            WHERE l.owner = ?1
              AND (?2 IS NULL OR e.clicked_at >= ?2)
              AND (?3 IS NULL OR e.clicked_at < ?3)
            "#,
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn unique_visitors_by_link(
        &self,
        owner: &str,
        window: Option<Window>,
    ) -> Result<HashMap<i64, i64>> {
        let (start, end) = window_bounds(window);

        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT e.link_id, COUNT(DISTINCT e.visitor_hash) FROM click_events e
            JOIN links l ON l.id = e.link_id
            WHERE l.owner = ?1
              AND (?2 IS NULL OR e.clicked_at >= ?2)
              AND (?3 IS NULL OR e.clicked_at < ?3)
            GROUP BY e.link_id
            "#,
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn clicks_by_country(
        &self,
        owner: &str,
        window: Option<Window>,
    ) -> Result<Vec<CountrySlice>> {
        let (start, end) = window_bounds(window);

        let slices = sqlx::query_as::<_, CountrySlice>(
            r#"
            SELECT e.country AS country,
                   COUNT(*) AS clicks,
                   COUNT(DISTINCT e.visitor_hash) AS unique_visitors
            FROM click_events e
            JOIN links l ON l.id = e.link_id
            WHERE l.owner = ?1
              AND e.country IS NOT NULL
              AND (?2 IS NULL OR e.clicked_at >= ?2)
              AND (?3 IS NULL OR e.clicked_at < ?3)
            GROUP BY e.country
            ORDER BY clicks DESC, e.country ASC
            "#,
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(slices)
    }

    async fn clicks_time_series(
        &self,
        owner: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<SeriesPoint>> {
        // SQLite has no date_trunc; buckets are built by formatting the
        // timestamp down to the granularity boundary and parsing it back.
        let fmt = match granularity {
            Granularity::Hour => "%Y-%m-%d %H:00:00",
            Granularity::Day => "%Y-%m-%d 00:00:00",
            Granularity::Month => "%Y-%m-01 00:00:00",
        };

        let points = sqlx::query_as::<_, SeriesPoint>(
            r#"
            SELECT CAST(strftime('%s', strftime(?1, e.clicked_at, 'unixepoch')) AS INTEGER) AS bucket,
                   COUNT(*) AS value
            FROM click_events e
            JOIN links l ON l.id = e.link_id
            WHERE l.owner = ?2 AND e.clicked_at >= ?3 AND e.clicked_at < ?4
            GROUP BY bucket
            ORDER BY bucket
            "#,
        )
        .bind(fmt)
        .bind(owner)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(points)
    }
}
