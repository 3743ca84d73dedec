//! Dashboard aggregation engine
//!
//! Composes the handful of read-only aggregate queries behind one dashboard
//! payload: KPI totals with previous-period comparison, a bucketed click
//! series, the country breakdown, and the per-link table. Queries run
//! against whichever storage dialect is configured; the engine normalizes
//! everything to the same shapes (ISO-8601 UTC timestamps, percentages).
//!
//! The sub-queries are independent reads and are not expected to observe a
//! single consistent snapshot; clicks landing mid-request may appear in some
//! aggregates and not others.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::analytics::country_names::country_name;
use crate::analytics::models::{
    CountryBreakdown, DashboardData, Granularity, KpiSummary, LinkTableRow, SparklinePoint, Window,
};
use crate::models::Link;
use crate::storage::Storage;

/// Maximum rows in the dashboard's per-link table.
const LINK_TABLE_LIMIT: i64 = 100;

/// Period-over-period change in percent. A zero previous period reads as
/// 100% growth when anything happened at all, 0% otherwise, so the dashboard
/// never divides by zero.
pub fn delta_pct(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        if current > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) as f64 / previous as f64 * 100.0
    }
}

/// Epoch seconds to the canonical ISO-8601 UTC representation used in every
/// dashboard payload, regardless of which dialect produced the value.
pub fn epoch_to_iso(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct AggregationEngine {
    storage: Arc<dyn Storage>,
}

impl AggregationEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// KPI totals for one window: (clicks, links, unique visitors).
    async fn kpi_totals(&self, owner: &str, window: Window) -> Result<(i64, i64, i64)> {
        let clicks = self.storage.total_clicks(owner, Some(window)).await?;
        let links = self.storage.total_links(owner).await?;
        let visitors = self.storage.unique_visitors(owner, Some(window)).await?;
        Ok((clicks, links, visitors))
    }

    /// Build the full dashboard payload for an owner over a validated window.
    ///
    /// `granularity` is the caller's choice (see
    /// [`Granularity::for_window`]); the engine does not second-guess it.
    pub async fn dashboard(
        &self,
        owner: &str,
        window: Window,
        granularity: Granularity,
    ) -> Result<DashboardData> {
        let (total_clicks, total_links, unique_visitors) = self.kpi_totals(owner, window).await?;

        // The preceding window of equal duration; link existence is not
        // bounded by the comparison window, so total_links repeats.
        let previous = window.previous();
        let previous_clicks = self.storage.total_clicks(owner, Some(previous)).await?;
        let previous_visitors = self.storage.unique_visitors(owner, Some(previous)).await?;
        let previous_links = total_links;

        let kpis = KpiSummary {
            total_clicks,
            total_links,
            unique_visitors,
            previous_total_clicks: previous_clicks,
            previous_total_links: previous_links,
            previous_unique_visitors: previous_visitors,
            clicks_delta_pct: delta_pct(total_clicks, previous_clicks),
            links_delta_pct: delta_pct(total_links, previous_links),
            visitors_delta_pct: delta_pct(unique_visitors, previous_visitors),
        };

        let sparkline = self
            .storage
            .clicks_time_series(owner, window, granularity)
            .await?
            .into_iter()
            .map(|point| SparklinePoint {
                timestamp: epoch_to_iso(point.bucket),
                value: point.value,
            })
            .collect();

        let countries = self.country_breakdown(owner, window).await?;
        let links = self.link_table(owner, window).await?;

        Ok(DashboardData {
            kpis,
            sparkline,
            countries,
            links,
        })
    }

    async fn country_breakdown(
        &self,
        owner: &str,
        window: Window,
    ) -> Result<Vec<CountryBreakdown>> {
        let slices = self.storage.clicks_by_country(owner, Some(window)).await?;
        let total: i64 = slices.iter().map(|s| s.clicks).sum();

        Ok(slices
            .into_iter()
            .map(|slice| CountryBreakdown {
                country_name: country_name(&slice.country),
                country_code: slice.country,
                clicks: slice.clicks,
                unique_visitors: slice.unique_visitors,
                percentage: if total > 0 {
                    slice.clicks as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect())
    }

    async fn link_table(&self, owner: &str, window: Window) -> Result<Vec<LinkTableRow>> {
        let links = self.storage.list_links(owner, LINK_TABLE_LIMIT, 0).await?;
        let visitors = self
            .storage
            .unique_visitors_by_link(owner, Some(window))
            .await?;

        Ok(links
            .into_iter()
            .map(|link| {
                let unique_visitors = visitors.get(&link.id).copied().unwrap_or(0);
                link_table_row(link, unique_visitors)
            })
            .collect())
    }
}

fn link_table_row(link: Link, unique_visitors: i64) -> LinkTableRow {
    LinkTableRow {
        id: link.id,
        short_code: link.slug,
        target_url: link.target_url,
        status: if link.is_active { "active" } else { "inactive" }.to_string(),
        clicks: link.click_count,
        unique_visitors,
        last_clicked: link.last_clicked_at.map(epoch_to_iso),
        created: epoch_to_iso(link.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_pct_zero_previous() {
        assert_eq!(delta_pct(5, 0), 100.0);
        assert_eq!(delta_pct(0, 0), 0.0);
    }

    #[test]
    fn test_delta_pct_regular() {
        assert_eq!(delta_pct(5, 10), -50.0);
        assert_eq!(delta_pct(15, 10), 50.0);
        assert_eq!(delta_pct(10, 10), 0.0);
    }

    #[test]
    fn test_epoch_to_iso_is_utc() {
        assert_eq!(epoch_to_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(epoch_to_iso(1_700_000_000), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_link_table_row_status() {
        let link = Link {
            id: 7,
            owner: "user-1".to_string(),
            slug: Some("abc1234".to_string()),
            target_url: "https://example.com".to_string(),
            is_active: false,
            created_at: 1_700_000_000,
            click_count: 3,
            last_clicked_at: None,
        };

        let row = link_table_row(link, 2);
        assert_eq!(row.status, "inactive");
        assert_eq!(row.short_code.as_deref(), Some("abc1234"));
        assert_eq!(row.unique_visitors, 2);
        assert_eq!(row.last_clicked, None);
    }
}
