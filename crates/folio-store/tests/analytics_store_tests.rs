use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use folio_core::{Clock, ManualClock, UtcDateTime};
use folio_entities::{
    AnalyticsEvent, DailyStats, DeviceInfo, DeviceType, EventCategory, GeoInfo, Pageview,
    PerformanceMetrics, ReferrerInfo, ReferrerType, Session, UtmParams, Visitor,
};
use folio_store::{
    AnalyticsStore, Collections, DocValue, DocumentStore, MemoryDocumentStore, PageviewPatch,
    SessionPatch,
};
use serde_json::json;

fn t0() -> UtcDateTime {
    Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap()
}

fn setup() -> (Arc<MemoryDocumentStore>, Arc<ManualClock>, AnalyticsStore) {
    let clock = Arc::new(ManualClock::new(t0()));
    let backend = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
    let store = AnalyticsStore::with_clock(backend.clone(), clock.clone()).with_batch_size(2);
    (backend, clock, store)
}

fn session(id: &str, visitor_id: &str, started_at: UtcDateTime) -> Session {
    Session {
        id: id.to_string(),
        visitor_id: visitor_id.to_string(),
        fingerprint: "fp-1".to_string(),
        started_at,
        last_activity_at: started_at,
        duration: 0,
        pageviews: 0,
        events: 0,
        device: DeviceInfo {
            device_type: DeviceType::Desktop,
            browser: "Firefox".to_string(),
            ..Default::default()
        },
        geo: GeoInfo::unknown("Europe/Madrid"),
        referrer: ReferrerInfo::direct(),
        utm: UtmParams::default(),
        is_bot: false,
        is_bounce: true,
        bot_name: None,
    }
}

fn visitor(id: &str) -> Visitor {
    Visitor {
        id: id.to_string(),
        fingerprint: "fp-1".to_string(),
        first_seen_at: t0(),
        last_seen_at: t0(),
        total_sessions: 1,
        total_pageviews: 0,
        total_events: 0,
        devices: vec![DeviceInfo::default()],
        locations: vec![],
        tags: vec![],
    }
}

fn pageview(id: &str, session_id: &str, path: &str, at: UtcDateTime) -> Pageview {
    Pageview {
        id: id.to_string(),
        session_id: session_id.to_string(),
        visitor_id: "v-1".to_string(),
        path: path.to_string(),
        title: format!("Title of {}", path),
        referrer: String::new(),
        timestamp: at,
        time_on_page: 0,
        scroll_depth: 0,
        device: DeviceInfo::default(),
        performance: PerformanceMetrics::default(),
    }
}

fn event(id: &str, name: &str, at: UtcDateTime) -> AnalyticsEvent {
    AnalyticsEvent {
        id: id.to_string(),
        session_id: "s-1".to_string(),
        visitor_id: "v-1".to_string(),
        pageview_id: None,
        category: EventCategory::Engagement,
        name: name.to_string(),
        label: None,
        value: None,
        properties: None,
        timestamp: at,
        path: "/".to_string(),
    }
}

#[tokio::test]
async fn test_session_round_trip_and_patch() {
    let (backend, clock, store) = setup();
    let s = session("s-1", "v-1", t0());
    store.save_session(&s).await;
    assert_eq!(store.get_session("s-1").await, Some(s.clone()));

    clock.advance_millis(90_000);
    let mut updated = s.clone();
    updated.last_activity_at = clock.now();
    updated.duration = 90_000;
    updated.pageviews = 2;
    updated.is_bounce = false;
    store
        .update_session("s-1", &SessionPatch::activity(&updated))
        .await;

    assert_eq!(store.get_session("s-1").await, Some(updated));

    let doc = backend
        .get(Collections::SESSIONS, "s-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("createdAt"), Some(&DocValue::Timestamp(t0())));
    assert_eq!(
        doc.get("updatedAt"),
        Some(&DocValue::Timestamp(t0() + Duration::milliseconds(90_000)))
    );
}

#[tokio::test]
async fn test_geo_patch_only_touches_geo() {
    let (_, _, store) = setup();
    let s = session("s-1", "v-1", t0());
    store.save_session(&s).await;

    let mut geo = GeoInfo::unknown("Europe/Madrid");
    geo.country = "Spain".to_string();
    geo.country_code = "ES".to_string();
    store.update_session("s-1", &SessionPatch::geo(geo.clone())).await;

    let stored = store.get_session("s-1").await.unwrap();
    assert_eq!(stored.geo, geo);
    assert_eq!(stored.device, s.device);
}

#[tokio::test]
async fn test_update_of_missing_session_is_swallowed() {
    let (backend, _, store) = setup();
    store
        .update_session("nope", &SessionPatch::geo(GeoInfo::default()))
        .await;
    assert!(store.try_update_session("nope", &SessionPatch::default()).await.is_err());
    assert_eq!(backend.count(Collections::SESSIONS), 0);
}

#[tokio::test]
async fn test_visitor_upsert_increments_sessions() {
    let (backend, clock, store) = setup();
    store.save_visitor(&visitor("v-1")).await;
    clock.advance_millis(60_000);
    store.save_visitor(&visitor("v-1")).await;
    store.save_visitor(&visitor("v-1")).await;

    let stored = store.get_visitor("v-1").await.unwrap();
    assert_eq!(stored.total_sessions, 3);
    assert_eq!(stored.first_seen_at, t0());
    assert_eq!(stored.last_seen_at, t0() + Duration::milliseconds(60_000));
    assert_eq!(stored.devices.len(), 1);
    assert_eq!(backend.count(Collections::VISITORS), 1);
}

#[tokio::test]
async fn test_pageview_and_event_bump_daily_counters() {
    let (_, _, store) = setup();
    store.save_pageview(&pageview("pv-1", "s-1", "/", t0())).await;
    store.save_pageview(&pageview("pv-2", "s-1", "/blog", t0())).await;
    store.save_event(&event("e-1", "code_copied", t0())).await;
    store.save_event(&event("e-2", "code_copied", t0())).await;
    store.save_event(&event("e-3", "newsletter_signup", t0())).await;

    let stats = store.get_daily_stats("2024-05-14", "2024-05-14").await;
    let today = &stats["2024-05-14"];
    assert_eq!(today.pageviews(), 2);
    assert_eq!(today.events(), 3);
    assert_eq!(today.get(&DailyStats::event_metric("code_copied")), 2);
    assert_eq!(today.get(&DailyStats::event_metric("newsletter_signup")), 1);
    assert_eq!(today.updated_at, Some(t0()));
}

#[tokio::test]
async fn test_daily_stats_roll_over_at_utc_midnight() {
    let (_, clock, store) = setup();
    store.increment_daily_stat("pageviews", 1).await;
    clock.advance_millis(14 * 60 * 60 * 1000);
    store.increment_daily_stat("pageviews", 4).await;

    let stats = store.get_daily_stats("2024-05-01", "2024-05-31").await;
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["2024-05-14"].pageviews(), 1);
    assert_eq!(stats["2024-05-15"].pageviews(), 4);
}

#[tokio::test]
async fn test_pageview_patch() {
    let (_, _, store) = setup();
    let mut pv = pageview("pv-1", "s-1", "/blog/rust", t0());
    store.save_pageview(&pv).await;

    pv.time_on_page = 42_000;
    pv.record_scroll_depth(75);
    store.update_pageview("pv-1", &PageviewPatch::finished(&pv)).await;

    let found = store.get_pageviews_by_path("/blog/rust", 10).await;
    assert_eq!(found, vec![pv]);
}

#[tokio::test]
async fn test_batch_is_chunked_and_idempotent() {
    let (backend, _, store) = setup();
    let events: Vec<_> = (0..5)
        .map(|i| event(&format!("e-{}", i), "scroll_depth", t0()))
        .collect();

    assert_eq!(store.save_events_batch(&events).await, 5);
    // batch size 2: 3 commits
    assert_eq!(backend.commit_count(), 3);
    assert_eq!(store.save_events_batch(&events).await, 5);
    assert_eq!(backend.count(Collections::EVENTS), 5);
    // batches never touch the daily aggregates
    assert_eq!(backend.count(Collections::DAILY_STATS), 0);
}

#[tokio::test]
async fn test_event_properties_keep_null_and_drop_reserved_keys() {
    let (_, _, store) = setup();
    let mut e = event("e-1", "outbound_click", t0());
    e.value = Some(2.5);
    e.properties = Some(
        json!({
            "url": "https://example.com",
            "ref": null,
            "__proto": 1,
            "a.b": 2,
        })
        .as_object()
        .unwrap()
        .clone(),
    );
    store.save_event(&e).await;

    let stored = store.get_recent_events(10, None).await;
    assert_eq!(stored.len(), 1);
    let props = stored[0].properties.as_ref().unwrap();
    assert_eq!(props.get("ref"), Some(&serde_json::Value::Null));
    assert_eq!(props["url"], "https://example.com");
    assert!(!props.contains_key("__proto"));
    assert!(!props.contains_key("a.b"));
    assert_eq!(stored[0].value, Some(2.5));
    assert_eq!(stored[0].label, None);
    assert_eq!(stored[0].pageview_id, None);
}

#[tokio::test]
async fn test_recent_queries_are_newest_first() {
    let (_, _, store) = setup();
    for i in 0..4 {
        let at = t0() + Duration::minutes(i);
        store.save_session(&session(&format!("s-{}", i), "v-1", at)).await;
        let name = if i % 2 == 0 { "even" } else { "odd" };
        store.save_event(&event(&format!("e-{}", i), name, at)).await;
    }

    let sessions = store.get_recent_sessions(2).await;
    let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s-3", "s-2"]);

    let odd = store.get_recent_events(10, Some("odd")).await;
    let ids: Vec<_> = odd.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e-3", "e-1"]);
}

#[tokio::test]
async fn test_failing_store_is_best_effort() {
    let (backend, _, store) = setup();
    backend.set_failing(true);

    store.save_session(&session("s-1", "v-1", t0())).await;
    store.save_visitor(&visitor("v-1")).await;
    store.save_pageview(&pageview("pv-1", "s-1", "/", t0())).await;
    store.save_event(&event("e-1", "x", t0())).await;
    assert_eq!(store.save_events_batch(&[event("e-2", "x", t0())]).await, 0);

    assert!(store.get_session("s-1").await.is_none());
    assert!(store.get_recent_sessions(10).await.is_empty());
    assert!(store.get_daily_stats("2024-01-01", "2024-12-31").await.is_empty());
    assert!(store
        .get_dashboard_metrics(t0(), t0() + Duration::days(1))
        .await
        .is_none());

    backend.set_failing(false);
    assert_eq!(backend.count(Collections::SESSIONS), 0);
}

#[tokio::test]
async fn test_dashboard_compares_with_previous_period() {
    let (_, _, store) = setup();
    let day = Duration::days(1);
    let start = t0();
    let end = t0() + day;

    // previous period: one visitor, one bounced session
    store
        .save_session(&session("old-1", "v-old", start - Duration::hours(12)))
        .await;
    store
        .save_pageview(&pageview("old-pv", "old-1", "/", start - Duration::hours(12)))
        .await;

    // current period: two visitors, one of them engaged
    let mut engaged = session("s-1", "v-1", start + Duration::hours(1));
    engaged.is_bounce = false;
    engaged.duration = 120_000;
    engaged.referrer = ReferrerInfo {
        raw: "https://news.ycombinator.com/item".to_string(),
        domain: "news.ycombinator.com".to_string(),
        referrer_type: ReferrerType::Referral,
        search_engine: None,
        social_network: None,
    };
    store.save_session(&engaged).await;
    store
        .save_session(&session("s-2", "v-2", start + Duration::hours(2)))
        .await;
    store
        .save_pageview(&pageview("pv-1", "s-1", "/blog", start + Duration::hours(1)))
        .await;
    store
        .save_pageview(&pageview("pv-2", "s-1", "/about", start + Duration::hours(1) + Duration::minutes(1)))
        .await;
    store
        .save_pageview(&pageview("pv-3", "s-2", "/blog", start + Duration::hours(2)))
        .await;
    let mut signup = event("e-1", "newsletter_signup", start + Duration::hours(1));
    signup.category = EventCategory::Conversion;
    store.save_event(&signup).await;

    let metrics = store.get_dashboard_metrics(start, end).await.unwrap();
    assert_eq!(metrics.overview.unique_visitors, 2);
    assert_eq!(metrics.overview.total_sessions, 2);
    assert_eq!(metrics.overview.total_pageviews, 3);
    assert_eq!(metrics.overview.bounce_rate, 50.0);
    assert_eq!(metrics.trends.visitors_change, 100.0);
    assert_eq!(metrics.trends.pageviews_change, 200.0);

    assert_eq!(metrics.top_pages[0].path, "/blog");
    assert_eq!(metrics.top_pages[0].views, 2);
    assert_eq!(metrics.top_referrers.len(), 1);
    assert_eq!(metrics.top_referrers[0].conversions, 1);
    assert_eq!(metrics.devices.desktop, 2);
    assert_eq!(metrics.events[0].name, "newsletter_signup");
}
