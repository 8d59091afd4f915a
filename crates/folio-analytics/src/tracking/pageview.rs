use std::sync::{Arc, Mutex};

use folio_core::{elapsed_millis, generate_id, AnalyticsConfig, Clock, UtcDateTime};
use folio_entities::{Pageview, PerformanceMetrics, WebVital};
use tracing::debug;

use crate::device::DeviceDetector;
use crate::environment::{PerformanceTiming, SharedEnvironment};
use crate::locked;
use crate::session::SessionManager;

/// Resource entries beyond this many are ignored in the performance snapshot
pub const MAX_RESOURCE_ENTRIES: usize = 250;

const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Performance snapshot of a page load. Missing entries leave their metrics at 0.
pub fn collect_performance(timing: Option<&PerformanceTiming>) -> PerformanceMetrics {
    let mut metrics = PerformanceMetrics::default();
    let Some(timing) = timing else {
        return metrics;
    };

    if let Some(nav) = &timing.navigation {
        metrics.ttfb = (nav.response_start - nav.request_start).max(0.0);
        metrics.page_load_time = (nav.load_event_end - nav.start_time).max(0.0);
        metrics.dom_content_loaded = (nav.dom_content_loaded_event_end - nav.start_time).max(0.0);
    }

    if let Some(fcp) = timing
        .paint
        .iter()
        .find(|entry| entry.name == FIRST_CONTENTFUL_PAINT)
    {
        metrics.fcp = fcp.start_time.max(0.0);
    }

    let resources = &timing.resources[..timing.resources.len().min(MAX_RESOURCE_ENTRIES)];
    metrics.resource_count = resources.len() as u32;
    metrics.resource_size = resources.iter().map(|r| r.transfer_size).sum();

    metrics
}

/// Result of starting a pageview: the new one, and the one it ended
#[derive(Debug, Clone, PartialEq)]
pub struct PageviewChange {
    pub current: Pageview,
    pub previous: Option<Pageview>,
}

#[derive(Debug)]
struct ActivePageview {
    pageview: Pageview,
    entered_at: UtcDateTime,
}

pub struct PageviewTracker {
    config: Arc<AnalyticsConfig>,
    clock: Arc<dyn Clock>,
    env: SharedEnvironment,
    sessions: Arc<SessionManager>,
    device: Arc<DeviceDetector>,
    active: Mutex<Option<ActivePageview>>,
    transition: tokio::sync::Mutex<()>,
}

impl PageviewTracker {
    pub fn new(
        config: Arc<AnalyticsConfig>,
        clock: Arc<dyn Clock>,
        env: SharedEnvironment,
        sessions: Arc<SessionManager>,
        device: Arc<DeviceDetector>,
    ) -> Self {
        Self {
            config,
            clock,
            env,
            sessions,
            device,
            active: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Start a pageview for `path` (default: the current location), ending the
    /// active one first. Returns `None` when tracking is disabled or the path
    /// is excluded.
    pub async fn track_pageview(&self, path: Option<&str>, title: Option<&str>) -> Option<PageviewChange> {
        if !self.config.enabled {
            return None;
        }

        let path = match path.filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => self.env.pathname(),
        };
        if self.config.is_path_excluded(&path) {
            debug!("Pageview for excluded path {} ignored", path);
            return None;
        }

        let _transition = self.transition.lock().await;
        let previous = self.end_pageview();
        let session = self.sessions.get_session().await;

        let env = self.env.snapshot();
        let now = self.clock.now();
        let performance = if self.config.features.performance {
            collect_performance(env.performance.as_ref())
        } else {
            PerformanceMetrics::default()
        };

        let pageview = Pageview {
            id: generate_id("pv", now),
            session_id: session.id,
            visitor_id: session.visitor_id,
            title: title
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| env.title.clone()),
            referrer: env.referrer.clone(),
            path,
            timestamp: now,
            time_on_page: 0,
            scroll_depth: 0,
            device: self.device.detect(&env),
            performance,
        };

        *locked(&self.active) = Some(ActivePageview {
            pageview: pageview.clone(),
            entered_at: now,
        });
        self.sessions.increment_pageviews();
        self.sessions.update_activity();
        debug!("Pageview {} on {}", pageview.id, pageview.path);

        Some(PageviewChange {
            current: pageview,
            previous,
        })
    }

    /// Record a scroll sample; only a deeper sample moves the maximum
    pub fn update_scroll_depth(&self, depth: u8) {
        if let Some(active) = locked(&self.active).as_mut() {
            active.pageview.record_scroll_depth(depth);
        }
    }

    /// Close the active pageview, fixing its time on page
    pub fn end_pageview(&self) -> Option<Pageview> {
        let active = locked(&self.active).take()?;
        let mut pageview = active.pageview;
        pageview.time_on_page = elapsed_millis(active.entered_at, self.clock.now());
        Some(pageview)
    }

    pub fn current(&self) -> Option<Pageview> {
        locked(&self.active).as_ref().map(|a| a.pageview.clone())
    }

    pub fn current_id(&self) -> Option<String> {
        locked(&self.active).as_ref().map(|a| a.pageview.id.clone())
    }

    /// Milliseconds since the active pageview started, 0 when none is active
    pub fn time_on_page(&self) -> u64 {
        locked(&self.active)
            .as_ref()
            .map(|a| elapsed_millis(a.entered_at, self.clock.now()))
            .unwrap_or(0)
    }

    /// Late-arriving web vital for the active pageview
    pub fn update_performance_metric(&self, vital: WebVital, value: f64) {
        if let Some(active) = locked(&self.active).as_mut() {
            active.pageview.performance.set_vital(vital, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{NavigationTiming, PaintEntry, ResourceEntry};

    #[test]
    fn test_collect_performance() {
        let timing = PerformanceTiming {
            navigation: Some(NavigationTiming {
                start_time: 0.0,
                request_start: 20.0,
                response_start: 120.0,
                dom_content_loaded_event_end: 800.0,
                load_event_end: 1500.0,
            }),
            paint: vec![
                PaintEntry {
                    name: "first-paint".to_string(),
                    start_time: 300.0,
                },
                PaintEntry {
                    name: FIRST_CONTENTFUL_PAINT.to_string(),
                    start_time: 420.0,
                },
            ],
            resources: vec![ResourceEntry { transfer_size: 1000 }; 300],
        };

        let metrics = collect_performance(Some(&timing));
        assert_eq!(metrics.ttfb, 100.0);
        assert_eq!(metrics.page_load_time, 1500.0);
        assert_eq!(metrics.dom_content_loaded, 800.0);
        assert_eq!(metrics.fcp, 420.0);
        assert_eq!(metrics.resource_count, 250);
        assert_eq!(metrics.resource_size, 250_000);
        assert_eq!(metrics.lcp, 0.0);
    }

    #[test]
    fn test_collect_performance_clamps_unfinished_load() {
        let timing = PerformanceTiming {
            navigation: Some(NavigationTiming {
                start_time: 10.0,
                request_start: 20.0,
                response_start: 50.0,
                dom_content_loaded_event_end: 0.0,
                load_event_end: 0.0,
            }),
            ..Default::default()
        };
        let metrics = collect_performance(Some(&timing));
        assert_eq!(metrics.page_load_time, 0.0);
        assert_eq!(metrics.dom_content_loaded, 0.0);
        assert_eq!(collect_performance(None), PerformanceMetrics::default());
    }
}
