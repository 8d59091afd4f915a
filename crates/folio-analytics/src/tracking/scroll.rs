use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use folio_core::{AnalyticsConfig, Debouncer, Throttle};
use tracing::debug;

use super::catalog::EventCatalog;
use super::events::EventTracker;
use super::pageview::PageviewTracker;
use crate::environment::{BrowserEnvironment, SharedEnvironment};
use crate::locked;

/// Scrollable geometry of the document, in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollDimensions {
    pub document_height: f64,
    pub viewport_height: f64,
}

impl ScrollDimensions {
    pub fn new(document_height: f64, viewport_height: f64) -> Self {
        Self {
            document_height,
            viewport_height,
        }
    }

    pub fn from_environment(env: &BrowserEnvironment) -> Self {
        Self::new(env.document_height, env.viewport_height as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollState {
    #[default]
    Idle,
    Active,
}

/// Scroll depth in percent. A page that fits the viewport counts as fully read.
pub fn scroll_depth(dimensions: ScrollDimensions, scroll_top: f64) -> u8 {
    let scrollable = dimensions.document_height - dimensions.viewport_height;
    if scrollable <= 0.0 {
        return 100;
    }
    let depth = (scroll_top / scrollable * 100.0).round();
    depth.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Default)]
struct ScrollInner {
    state: ScrollState,
    dimensions: ScrollDimensions,
    fired: BTreeSet<u8>,
    max_depth: u8,
}

pub struct ScrollTracker {
    config: Arc<AnalyticsConfig>,
    thresholds: Vec<u8>,
    env: SharedEnvironment,
    pageviews: Arc<PageviewTracker>,
    events: Arc<EventTracker>,
    inner: Arc<Mutex<ScrollInner>>,
    throttle: Throttle,
    resize: Debouncer,
}

impl ScrollTracker {
    pub fn new(
        config: Arc<AnalyticsConfig>,
        env: SharedEnvironment,
        pageviews: Arc<PageviewTracker>,
        events: Arc<EventTracker>,
    ) -> Self {
        Self {
            thresholds: config.normalized_thresholds(),
            throttle: Throttle::new(config.scroll_throttle()),
            resize: Debouncer::new("scroll-resize", config.resize_debounce()),
            config,
            env,
            pageviews,
            events,
            inner: Arc::new(Mutex::new(ScrollInner::default())),
        }
    }

    /// Begin tracking and take an initial sample. No-op when already active
    /// or when scroll tracking is switched off.
    pub async fn start(&self, dimensions: ScrollDimensions, scroll_top: f64) {
        if !self.config.features.scroll_tracking {
            return;
        }
        {
            let mut inner = locked(&self.inner);
            if inner.state == ScrollState::Active {
                return;
            }
            inner.fired.clear();
            inner.max_depth = 0;
            inner.dimensions = dimensions;
            inner.state = ScrollState::Active;
        }
        self.throttle.reset();
        if self.config.debug {
            debug!("Scroll tracking started");
        }
        self.sample(scroll_top).await;
    }

    /// Throttled scroll sample; samples inside the throttle window are dropped
    pub async fn on_scroll(&self, scroll_top: f64) {
        if self.state() != ScrollState::Active || !self.throttle.try_acquire() {
            return;
        }
        self.sample(scroll_top).await;
    }

    /// Debounced: only the last resize of a burst updates the dimensions
    pub fn on_resize(&self, dimensions: ScrollDimensions) {
        if self.state() != ScrollState::Active {
            return;
        }
        let inner = self.inner.clone();
        self.resize.call(async move {
            locked(&inner).dimensions = dimensions;
        });
    }

    /// Unthrottled sample with fresh dimensions, for content that loaded late
    pub async fn check(&self, dimensions: ScrollDimensions, scroll_top: f64) {
        locked(&self.inner).dimensions = dimensions;
        self.sample(scroll_top).await;
    }

    pub fn stop(&self) {
        self.resize.cancel();
        let mut inner = locked(&self.inner);
        if inner.state == ScrollState::Active && self.config.debug {
            debug!("Scroll tracking stopped");
        }
        inner.state = ScrollState::Idle;
    }

    /// Forget fired thresholds and depth for a new page; tracking stays active
    pub fn reset(&self, dimensions: Option<ScrollDimensions>) {
        let mut inner = locked(&self.inner);
        inner.fired.clear();
        inner.max_depth = 0;
        if let Some(dimensions) = dimensions {
            inner.dimensions = dimensions;
        }
    }

    async fn sample(&self, scroll_top: f64) {
        let (depth, crossed) = {
            let mut inner = locked(&self.inner);
            if inner.state != ScrollState::Active {
                return;
            }
            let depth = scroll_depth(inner.dimensions, scroll_top);
            inner.max_depth = inner.max_depth.max(depth);

            let mut crossed = Vec::new();
            for threshold in &self.thresholds {
                if depth >= *threshold && inner.fired.insert(*threshold) {
                    crossed.push(*threshold);
                }
            }
            (depth, crossed)
        };

        self.pageviews.update_scroll_depth(depth);
        if crossed.is_empty() {
            return;
        }

        let path = self.env.pathname();
        for threshold in crossed {
            if self.config.debug {
                debug!("Scroll depth: {}%", threshold);
            }
            self.events.track_scroll_depth(threshold, &path).await;
        }
    }

    pub fn state(&self) -> ScrollState {
        locked(&self.inner).state
    }

    pub fn max_depth(&self) -> u8 {
        locked(&self.inner).max_depth
    }

    /// Thresholds fired on the current page, ascending
    pub fn fired_thresholds(&self) -> Vec<u8> {
        locked(&self.inner).fired.iter().copied().collect()
    }

    pub fn dimensions(&self) -> ScrollDimensions {
        locked(&self.inner).dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_depth() {
        let dims = ScrollDimensions::new(3000.0, 1000.0);
        assert_eq!(scroll_depth(dims, 0.0), 0);
        assert_eq!(scroll_depth(dims, 500.0), 25);
        assert_eq!(scroll_depth(dims, 999.0), 50);
        assert_eq!(scroll_depth(dims, 2000.0), 100);
        assert_eq!(scroll_depth(dims, 5000.0), 100);
        assert_eq!(scroll_depth(dims, -40.0), 0);
    }

    #[test]
    fn test_short_page_counts_as_fully_read() {
        assert_eq!(scroll_depth(ScrollDimensions::new(600.0, 800.0), 0.0), 100);
        assert_eq!(scroll_depth(ScrollDimensions::default(), 0.0), 100);
    }
}
