//! Integration tests for link management and click capture
//!
//! These run against in-memory SQLite storage. PostgreSQL coverage lives in
//! `aggregation_integration.rs` behind the DATABASE_BACKEND/DATABASE_URL
//! gates used across this repo's test suite.

use std::sync::Arc;

use async_trait::async_trait;
use linkpulse::analytics::{ClickContext, ClickRecorder, CountryResolver, Window};
use linkpulse::models::NewClickEvent;
use linkpulse::slug::slug_for_id;
use linkpulse::storage::{SqliteStorage, Storage, StorageError};

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Helper to create SQLite test storage.
///
/// A single connection keeps every query on the same in-memory database.
async fn create_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Resolver stub returning a fixed country, mirroring the injectable
/// capability the write path depends on.
struct StubResolver(Option<&'static str>);

#[async_trait]
impl CountryResolver for StubResolver {
    async fn resolve_country(&self, ip: Option<&str>) -> Option<String> {
        ip?;
        self.0.map(str::to_string)
    }
}

fn context(ip: &str, ua: Option<&str>, referrer: Option<&str>) -> ClickContext {
    ClickContext {
        client_ip: Some(ip.to_string()),
        user_agent: ua.map(str::to_string),
        referrer: referrer.map(str::to_string),
    }
}

#[tokio::test]
async fn test_create_link_assigns_slug_from_id() {
    let storage = create_storage().await;

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    assert!(link.id > 0);
    assert_eq!(link.owner, "user-1");
    assert!(link.is_active);
    assert_eq!(link.click_count, 0);
    assert_eq!(link.last_clicked_at, None);

    // The slug is a pure function of the row id.
    assert_eq!(link.slug.as_deref(), Some(slug_for_id(link.id).unwrap().as_str()));
}

#[tokio::test]
async fn test_create_multiple_links_distinct_slugs() {
    let storage = create_storage().await;

    let a = storage
        .create_link("user-1", "https://example.com/1")
        .await
        .unwrap();
    let b = storage
        .create_link("user-1", "https://example.com/2")
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.slug, b.slug);
}

#[tokio::test]
async fn test_slug_lookup_active_only() {
    let storage = create_storage().await;

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();
    let slug = link.slug.clone().unwrap();

    let found = storage.get_active_by_slug(&slug).await.unwrap();
    assert_eq!(found.map(|l| l.id), Some(link.id));

    assert!(storage
        .get_active_by_slug("nonexistent")
        .await
        .unwrap()
        .is_none());

    // A deactivated link reads exactly like a missing one.
    storage
        .set_link_active("user-1", link.id, false)
        .await
        .unwrap();
    assert!(storage.get_active_by_slug(&slug).await.unwrap().is_none());
}

#[tokio::test]
async fn test_record_click_via_recorder() {
    let storage = create_storage().await;
    let recorder = ClickRecorder::new(Arc::clone(&storage), Arc::new(StubResolver(Some("DE"))));

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    let ctx = context(
        "203.0.113.7",
        Some(CHROME_UA),
        Some("https://google.com/search?q=test"),
    );
    recorder.record(&link, &ctx).await.unwrap();

    let updated = storage
        .get_link_for_owner("user-1", link.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.click_count, 1);
    assert!(updated.last_clicked_at.is_some());

    let events = storage.recent_clicks(link.id, 10).await.unwrap();
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.link_id, link.id);
    assert_eq!(event.referrer_host.as_deref(), Some("google.com"));
    assert_eq!(event.country.as_deref(), Some("DE"));
    assert_eq!(event.device_category.as_deref(), Some("desktop"));
    assert_eq!(event.browser_name.as_deref(), Some("Chrome"));
    assert_eq!(event.engine.as_deref(), Some("Blink"));

    let hash = event.visitor_hash.as_deref().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_record_click_without_identity_sources() {
    let storage = create_storage().await;
    let recorder = ClickRecorder::new(Arc::clone(&storage), Arc::new(StubResolver(Some("DE"))));

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    // No IP, no UA, no referrer: the click still counts, every derived
    // field stays absent.
    recorder.record(&link, &ClickContext::default()).await.unwrap();

    let events = storage.recent_clicks(link.id, 10).await.unwrap();
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.visitor_hash, None);
    assert_eq!(event.country, None);
    assert_eq!(event.device_category, None);
    assert_eq!(event.browser_name, None);
    assert_eq!(event.referrer_host, None);

    let updated = storage
        .get_link_for_owner("user-1", link.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.click_count, 1);
}

#[tokio::test]
async fn test_record_click_survives_failed_geo_lookup() {
    let storage = create_storage().await;
    // A resolver that never finds anything stands in for network failure.
    let recorder = ClickRecorder::new(Arc::clone(&storage), Arc::new(StubResolver(None)));

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    let ctx = context("203.0.113.7", Some(CHROME_UA), None);
    recorder.record(&link, &ctx).await.unwrap();

    let events = storage.recent_clicks(link.id, 10).await.unwrap();
    assert_eq!(events[0].country, None);
    // The rest of the pipeline was unaffected.
    assert!(events[0].visitor_hash.is_some());
    assert_eq!(events[0].device_category.as_deref(), Some("desktop"));
}

#[tokio::test]
async fn test_list_links_ordering_and_pagination() {
    let storage = create_storage().await;

    for i in 0..5 {
        storage
            .create_link("user-1", &format!("https://example.com/{}", i))
            .await
            .unwrap();
    }

    let page1 = storage.list_links("user-1", 2, 0).await.unwrap();
    let page2 = storage.list_links("user-1", 2, 2).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);

    let ids1: Vec<i64> = page1.iter().map(|l| l.id).collect();
    let ids2: Vec<i64> = page2.iter().map(|l| l.id).collect();
    assert!(ids1.iter().all(|id| !ids2.contains(id)));

    // Newest first.
    let all = storage.list_links("user-1", 10, 0).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].id > w[1].id));
}

#[tokio::test]
async fn test_links_are_owner_scoped() {
    let storage = create_storage().await;

    let mine = storage
        .create_link("user-1", "https://example.com/mine")
        .await
        .unwrap();
    let theirs = storage
        .create_link("user-2", "https://example.com/theirs")
        .await
        .unwrap();

    let listed = storage.list_links("user-1", 10, 0).await.unwrap();
    assert!(listed.iter().any(|l| l.id == mine.id));
    assert!(listed.iter().all(|l| l.id != theirs.id));

    // Foreign links read as absent, same as missing ones.
    assert!(storage
        .get_link_for_owner("user-1", theirs.id)
        .await
        .unwrap()
        .is_none());
    assert!(storage
        .set_link_active("user-1", theirs.id, false)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_set_link_active_round_trip() {
    let storage = create_storage().await;

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    let off = storage
        .set_link_active("user-1", link.id, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!off.is_active);

    let on = storage
        .set_link_active("user-1", link.id, true)
        .await
        .unwrap()
        .unwrap();
    assert!(on.is_active);
}

#[tokio::test]
async fn test_count_clicks_last_24h_excludes_old_events() {
    let storage = create_storage().await;

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    let now = chrono::Utc::now().timestamp();
    for clicked_at in [now - 60, now - 3_600, now - 25 * 3_600] {
        storage
            .record_click(&NewClickEvent {
                link_id: link.id,
                clicked_at,
                visitor_hash: Some("a".repeat(64)),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let last_24h = Window::new(now - 86_400, now + 1).unwrap();
    let count = storage
        .count_clicks_for_link(link.id, Some(last_24h))
        .await
        .unwrap();
    assert_eq!(count, 2);

    // All-time count still sees every event.
    let all = storage.count_clicks_for_link(link.id, None).await.unwrap();
    assert_eq!(all, 3);
}

#[tokio::test]
async fn test_recent_clicks_limit_and_order() {
    let storage = create_storage().await;

    let link = storage
        .create_link("user-1", "https://example.com")
        .await
        .unwrap();

    let base = 1_700_000_000;
    for i in 0..5 {
        storage
            .record_click(&NewClickEvent {
                link_id: link.id,
                clicked_at: base + i,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let events = storage.recent_clicks(link.id, 3).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|w| w[0].clicked_at >= w[1].clicked_at));
    assert_eq!(events[0].clicked_at, base + 4);
}

#[tokio::test]
async fn test_storage_error_display() {
    // The conflict variant is what handlers translate into 409.
    let err = StorageError::Conflict;
    assert_eq!(err.to_string(), "slug already exists");
}
