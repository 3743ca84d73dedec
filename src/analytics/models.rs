//! Data models for analytics queries and the dashboard payload

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A half-open time range `[start, end)` in Unix epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Error)]
#[error("invalid date range: start must precede end")]
pub struct InvalidWindow;

impl Window {
    pub fn new(start: i64, end: i64) -> Result<Self, InvalidWindow> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidWindow)
        }
    }

    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }

    /// The immediately preceding window of equal duration,
    /// `[start - (end - start), start)`.
    pub fn previous(&self) -> Window {
        Window {
            start: self.start - self.duration_secs(),
            end: self.start,
        }
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Bucket width for a click time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    /// Dashboard policy: windows up to a day chart hourly, up to thirty days
    /// daily, anything longer monthly. Callers pick; the engine only obeys.
    pub fn for_window(window: &Window) -> Self {
        const DAY: i64 = 86_400;
        match window.duration_secs() {
            d if d <= DAY => Granularity::Hour,
            d if d <= 30 * DAY => Granularity::Day,
            _ => Granularity::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

/// One time-series bucket as returned by storage: bucket start in epoch
/// seconds plus the click count. Both dialects normalize to this shape.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SeriesPoint {
    pub bucket: i64,
    pub value: i64,
}

/// Per-country aggregate as returned by storage, ordered by clicks.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CountrySlice {
    pub country: String,
    pub clicks: i64,
    pub unique_visitors: i64,
}

/// Dashboard KPI totals for the current and previous period.
#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    pub total_clicks: i64,
    pub total_links: i64,
    pub unique_visitors: i64,
    pub previous_total_clicks: i64,
    pub previous_total_links: i64,
    pub previous_unique_visitors: i64,
    pub clicks_delta_pct: f64,
    pub links_delta_pct: f64,
    pub visitors_delta_pct: f64,
}

/// One point of the dashboard sparkline, timestamp normalized to ISO-8601
/// UTC regardless of which storage dialect produced the bucket.
#[derive(Debug, Clone, Serialize)]
pub struct SparklinePoint {
    pub timestamp: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryBreakdown {
    pub country_code: String,
    pub country_name: String,
    pub clicks: i64,
    pub unique_visitors: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkTableRow {
    pub id: i64,
    pub short_code: Option<String>,
    pub target_url: String,
    pub status: String,
    pub clicks: i64,
    pub unique_visitors: i64,
    pub last_clicked: Option<String>,
    pub created: String,
}

/// The composed dashboard response.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub kpis: KpiSummary,
    pub sparkline: Vec<SparklinePoint>,
    pub countries: Vec<CountryBreakdown>,
    pub links: Vec<LinkTableRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rejects_empty_and_inverted() {
        assert!(Window::new(100, 100).is_err());
        assert!(Window::new(200, 100).is_err());
        assert!(Window::new(100, 200).is_ok());
    }

    #[test]
    fn test_window_previous_period() {
        let window = Window::new(1_000, 1_600).unwrap();
        let previous = window.previous();
        assert_eq!(previous.start, 400);
        assert_eq!(previous.end, 1_000);
        assert_eq!(previous.duration_secs(), window.duration_secs());
    }

    #[test]
    fn test_window_half_open() {
        let window = Window::new(100, 200).unwrap();
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
        assert!(!window.contains(99));
    }

    #[test]
    fn test_granularity_policy() {
        const DAY: i64 = 86_400;
        let hour = Window::new(0, 6 * 3_600).unwrap();
        let day = Window::new(0, 7 * DAY).unwrap();
        let month = Window::new(0, 90 * DAY).unwrap();

        assert_eq!(Granularity::for_window(&hour), Granularity::Hour);
        assert_eq!(
            Granularity::for_window(&Window::new(0, DAY).unwrap()),
            Granularity::Hour
        );
        assert_eq!(Granularity::for_window(&day), Granularity::Day);
        assert_eq!(Granularity::for_window(&month), Granularity::Month);
    }
}
