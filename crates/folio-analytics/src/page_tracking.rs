//! Page-level helpers: automatic pageviews on navigation and article read
//! completion

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use folio_core::{elapsed_millis, Clock, UtcDateTime};
use folio_entities::{AnalyticsEvent, Pageview};

use crate::locked;
use crate::provider::Analytics;
use crate::tracking::{EventCatalog, TrackEvent};

/// Tracks a pageview each time the route path changes
pub struct PageTracker {
    analytics: Analytics,
    last_path: Mutex<Option<String>>,
}

impl PageTracker {
    pub fn new(analytics: Analytics) -> Self {
        Self {
            analytics,
            last_path: Mutex::new(None),
        }
    }

    /// Returns the new pageview, or `None` when the path did not change or
    /// tracking is off for it
    pub async fn track(&self, path: &str) -> Option<Pageview> {
        {
            let mut last = locked(&self.last_path);
            if last.as_deref() == Some(path) {
                return None;
            }
            *last = Some(path.to_string());
        }
        self.analytics.track_pageview(Some(path), None).await
    }

    pub fn last_path(&self) -> Option<String> {
        locked(&self.last_path).clone()
    }
}

/// Read-through of a single article. Opening it tracks `article_view`;
/// [`mark_completed`](Self::mark_completed) tracks `article_completed` once.
pub struct ArticleReadTracker<T: TrackEvent> {
    tracker: T,
    clock: Arc<dyn Clock>,
    slug: String,
    title: String,
    opened_at: UtcDateTime,
    completed: AtomicBool,
}

impl<T: TrackEvent> ArticleReadTracker<T> {
    pub async fn open(tracker: T, clock: Arc<dyn Clock>, slug: &str, title: &str) -> Self {
        tracker.track_article_view(slug, title).await;
        let opened_at = clock.now();
        Self {
            tracker,
            clock,
            slug: slug.to_string(),
            title: title.to_string(),
            opened_at,
            completed: AtomicBool::new(false),
        }
    }

    /// Seconds since the article was opened, rounded
    pub fn read_time(&self) -> u64 {
        let millis = elapsed_millis(self.opened_at, self.clock.now());
        (millis + 500) / 1000
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub async fn mark_completed(&self) -> Option<AnalyticsEvent> {
        if self.completed.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.tracker
            .track_article_completed(&self.slug, &self.title, self.read_time())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use folio_core::ManualClock;
    use folio_entities::EventCategory;

    use crate::tracking::EventOptions;

    #[derive(Default)]
    struct Recorder {
        names: Mutex<Vec<(String, Option<f64>)>>,
    }

    #[async_trait]
    impl TrackEvent for Arc<Recorder> {
        async fn track_event(
            &self,
            name: &str,
            _category: EventCategory,
            options: EventOptions,
        ) -> Option<AnalyticsEvent> {
            locked(&self.names).push((name.to_string(), options.value));
            None
        }
    }

    #[tokio::test]
    async fn test_article_completed_fires_once_with_rounded_read_time() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let recorder = Arc::new(Recorder::default());

        let article =
            ArticleReadTracker::open(recorder.clone(), clock.clone(), "rust-async", "Rust Async").await;
        clock.advance_millis(95_600);
        assert_eq!(article.read_time(), 96);

        article.mark_completed().await;
        article.mark_completed().await;
        assert!(article.is_completed());

        let names = locked(&recorder.names).clone();
        assert_eq!(
            names,
            vec![
                ("article_view".to_string(), None),
                ("article_completed".to_string(), Some(96.0)),
            ]
        );
    }
}
