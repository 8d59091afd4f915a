//! Snapshot of the host page the tracking context runs in
//!
//! The tracking core never reaches for ambient browser globals. The host hands
//! it a [`BrowserEnvironment`] and keeps it current (navigation, resizes)
//! through a [`SharedEnvironment`].

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use url::Url;

/// `window.location`, reduced to what tracking reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub hostname: String,
    pub pathname: String,
    /// Query string including the leading `?`, or empty
    pub search: String,
}

impl Location {
    /// Parse an absolute URL, or a site-relative path such as `/blog?x=1`
    pub fn parse(href: &str) -> Self {
        if let Ok(url) = Url::parse(href) {
            return Self::from_url(&url, url.host_str().unwrap_or_default());
        }
        match Url::parse("http://localhost").and_then(|base| base.join(href)) {
            Ok(url) => Self::from_url(&url, ""),
            Err(_) => Self {
                pathname: href.to_string(),
                ..Default::default()
            },
        }
    }

    fn from_url(url: &Url, hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            pathname: url.path().to_string(),
            search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub start_time: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintEntry {
    pub name: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub transfer_size: u64,
}

/// Entries of the Performance API the pageview snapshot is built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTiming {
    pub navigation: Option<NavigationTiming>,
    #[serde(default)]
    pub paint: Vec<PaintEntry>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserEnvironment {
    pub user_agent: String,
    pub language: String,
    pub languages: Vec<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    pub pixel_ratio: f64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub document_height: f64,
    pub scroll_top: f64,
    /// IANA zone name, e.g. `Europe/Madrid`
    pub timezone: String,
    /// Minutes behind UTC, as `Date#getTimezoneOffset` reports it
    pub timezone_offset: i32,
    pub hardware_concurrency: u32,
    pub max_touch_points: u32,
    pub touch_events: bool,
    pub cookies_enabled: bool,
    pub do_not_track: bool,
    pub location: Location,
    pub title: String,
    pub referrer: String,
    /// Client address when the host knows it, for IP exclusion
    pub ip: Option<String>,
    pub performance: Option<PerformanceTiming>,
}

impl Default for BrowserEnvironment {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            language: "en".to_string(),
            languages: vec!["en".to_string()],
            screen_width: 0,
            screen_height: 0,
            color_depth: 0,
            pixel_ratio: 1.0,
            viewport_width: 0,
            viewport_height: 0,
            document_height: 0.0,
            scroll_top: 0.0,
            timezone: "UTC".to_string(),
            timezone_offset: 0,
            hardware_concurrency: 0,
            max_touch_points: 0,
            touch_events: false,
            cookies_enabled: false,
            do_not_track: false,
            location: Location::default(),
            title: String::new(),
            referrer: String::new(),
            ip: None,
            performance: None,
        }
    }
}

impl BrowserEnvironment {
    /// Environment of a page loaded at `href`
    pub fn at(href: &str) -> Self {
        Self {
            location: Location::parse(href),
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_screen(mut self, width: u32, height: u32, color_depth: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self.color_depth = color_depth;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn with_document_height(mut self, height: f64) -> Self {
        self.document_height = height;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>, offset_minutes: i32) -> Self {
        self.timezone = timezone.into();
        self.timezone_offset = offset_minutes;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.languages = vec![language.clone()];
        self.language = language;
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_performance(mut self, timing: PerformanceTiming) -> Self {
        self.performance = Some(timing);
        self
    }

    pub fn touch_support(&self) -> bool {
        self.touch_events || self.max_touch_points > 0
    }
}

/// Environment shared by every component of one tracking context
#[derive(Debug, Clone)]
pub struct SharedEnvironment {
    inner: Arc<RwLock<BrowserEnvironment>>,
}

impl SharedEnvironment {
    pub fn new(env: BrowserEnvironment) -> Self {
        Self {
            inner: Arc::new(RwLock::new(env)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BrowserEnvironment> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BrowserEnvironment> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> BrowserEnvironment {
        self.read().clone()
    }

    pub fn pathname(&self) -> String {
        self.read().location.pathname.clone()
    }

    pub fn user_agent(&self) -> String {
        self.read().user_agent.clone()
    }

    /// Client-side navigation: the location changes and the previous URL
    /// becomes the referrer, as in a browser
    pub fn navigate(&self, href: &str) {
        let mut env = self.write();
        let previous = &env.location;
        let referrer = if previous.hostname.is_empty() {
            String::new()
        } else {
            format!("https://{}{}{}", previous.hostname, previous.pathname, previous.search)
        };
        let mut location = Location::parse(href);
        if location.hostname.is_empty() {
            location.hostname = env.location.hostname.clone();
        }
        env.location = location;
        if !referrer.is_empty() {
            env.referrer = referrer;
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut BrowserEnvironment),
    {
        f(&mut self.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse_absolute_and_relative() {
        let loc = Location::parse("https://www.example.com/blog/post?utm_source=x#top");
        assert_eq!(loc.hostname, "www.example.com");
        assert_eq!(loc.pathname, "/blog/post");
        assert_eq!(loc.search, "?utm_source=x");

        let loc = Location::parse("/about");
        assert_eq!(loc.hostname, "");
        assert_eq!(loc.pathname, "/about");
        assert_eq!(loc.search, "");
    }

    #[test]
    fn test_navigate_keeps_host_and_sets_referrer() {
        let env = SharedEnvironment::new(BrowserEnvironment::at("https://example.com/"));
        env.navigate("/blog");

        let snapshot = env.snapshot();
        assert_eq!(snapshot.location.hostname, "example.com");
        assert_eq!(snapshot.location.pathname, "/blog");
        assert_eq!(snapshot.referrer, "https://example.com/");
    }
}
