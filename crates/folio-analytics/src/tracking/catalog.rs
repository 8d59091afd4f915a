//! Named events of the site, as sugar over [`TrackEvent::track_event`]

use async_trait::async_trait;
use folio_entities::{AnalyticsEvent, EventCategory};
use serde_json::{Map, Value};

use super::events::EventOptions;

/// Anything events can be tracked through
#[async_trait]
pub trait TrackEvent: Send + Sync {
    async fn track_event(
        &self,
        name: &str,
        category: EventCategory,
        options: EventOptions,
    ) -> Option<AnalyticsEvent>;
}

/// Property bag from optional entries; absent values are left out
fn bag<const N: usize>(entries: [(&str, Option<Value>); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

fn some(value: impl Into<Value>) -> Option<Value> {
    Some(value.into())
}

/// Extra properties override the fixed ones
fn merged(mut base: Map<String, Value>, extra: Option<Map<String, Value>>) -> Map<String, Value> {
    if let Some(extra) = extra {
        base.extend(extra);
    }
    base
}

fn with_properties(options: EventOptions, properties: Map<String, Value>) -> EventOptions {
    if properties.is_empty() {
        options
    } else {
        options.properties(properties)
    }
}

fn outcome(success: bool) -> f64 {
    if success {
        1.0
    } else {
        0.0
    }
}

fn link_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
pub trait EventCatalog: TrackEvent {
    /// `<form>_success` or `<form>_error`
    async fn track_form_submit(
        &self,
        form_name: &str,
        success: bool,
        properties: Option<Map<String, Value>>,
    ) -> Option<AnalyticsEvent> {
        let name = format!("{}_{}", form_name, if success { "success" } else { "error" });
        let mut options = EventOptions::new().label(form_name).value(outcome(success));
        options.properties = properties;
        self.track_event(&name, EventCategory::Conversion, options).await
    }

    async fn track_contact_form(
        &self,
        success: bool,
        data: Option<Map<String, Value>>,
    ) -> Option<AnalyticsEvent> {
        let name = if success { "contact_form_success" } else { "contact_form_error" };
        let mut options = EventOptions::new().label("Contact Form").value(outcome(success));
        options.properties = data;
        self.track_event(name, EventCategory::Conversion, options).await
    }

    /// Only whether an address was given is recorded, never the address
    async fn track_newsletter(&self, success: bool, email: Option<&str>) -> Option<AnalyticsEvent> {
        let name = if success { "newsletter_success" } else { "newsletter_error" };
        let mut options = EventOptions::new().label("Newsletter").value(outcome(success));
        if email.is_some() {
            options = options.property("hasEmail", true);
        }
        self.track_event(name, EventCategory::Conversion, options).await
    }

    async fn track_cv_download(&self, format: Option<&str>) -> Option<AnalyticsEvent> {
        let options = EventOptions::new().label(format.unwrap_or("PDF")).value(1.0);
        let options = with_properties(options, bag([("format", format.map(Value::from))]));
        self.track_event("cv_download", EventCategory::Conversion, options).await
    }

    async fn track_article_view(&self, slug: &str, title: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(title)
            .properties(bag([("slug", some(slug)), ("title", some(title))]));
        self.track_event("article_view", EventCategory::Content, options).await
    }

    /// `read_time` in seconds
    async fn track_article_completed(
        &self,
        slug: &str,
        title: &str,
        read_time: u64,
    ) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(title)
            .value(read_time as f64)
            .properties(bag([
                ("slug", some(slug)),
                ("title", some(title)),
                ("readTime", some(read_time)),
            ]));
        self.track_event("article_completed", EventCategory::Engagement, options).await
    }

    async fn track_article_share(&self, slug: &str, platform: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(platform)
            .properties(bag([("slug", some(slug)), ("platform", some(platform))]));
        self.track_event("article_share", EventCategory::Social, options).await
    }

    async fn track_code_copy(
        &self,
        language: Option<&str>,
        snippet: Option<&str>,
    ) -> Option<AnalyticsEvent> {
        let properties = bag([
            ("language", language.map(Value::from)),
            ("snippetLength", snippet.map(|s| Value::from(s.encode_utf16().count()))),
        ]);
        let options = with_properties(
            EventOptions::new().label(language.unwrap_or("unknown")),
            properties,
        );
        self.track_event("code_copied", EventCategory::Engagement, options).await
    }

    async fn track_social_click(&self, platform: &str, url: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(platform)
            .properties(bag([("platform", some(platform)), ("url", some(url))]));
        self.track_event("social_click", EventCategory::Social, options).await
    }

    async fn track_external_link(&self, url: &str, text: Option<&str>) -> Option<AnalyticsEvent> {
        let domain = link_domain(url);
        let properties = bag([
            ("url", some(url)),
            ("text", text.map(Value::from)),
            ("domain", some(domain.as_str())),
        ]);
        let options = EventOptions::new().label(domain).properties(properties);
        self.track_event("external_link", EventCategory::Navigation, options).await
    }

    async fn track_internal_link(&self, path: &str, text: Option<&str>) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(path)
            .properties(bag([("path", some(path)), ("text", text.map(Value::from))]));
        self.track_event("internal_link", EventCategory::Navigation, options).await
    }

    async fn track_conference_view(
        &self,
        title: &str,
        properties: Option<Map<String, Value>>,
    ) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(title)
            .properties(merged(bag([("title", some(title))]), properties));
        self.track_event("conference_view", EventCategory::Content, options).await
    }

    async fn track_conference_click(&self, title: &str, action: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(format!("{} - {}", title, action))
            .properties(bag([("title", some(title)), ("action", some(action))]));
        self.track_event("conference_click", EventCategory::Engagement, options).await
    }

    async fn track_project_view(
        &self,
        title: &str,
        properties: Option<Map<String, Value>>,
    ) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(title)
            .properties(merged(bag([("title", some(title))]), properties));
        self.track_event("project_view", EventCategory::Content, options).await
    }

    async fn track_project_click(
        &self,
        title: &str,
        action: &str,
        url: Option<&str>,
    ) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(format!("{} - {}", title, action))
            .properties(bag([
                ("title", some(title)),
                ("action", some(action)),
                ("url", url.map(Value::from)),
            ]));
        self.track_event("project_click", EventCategory::Engagement, options).await
    }

    async fn track_service_view(&self, service: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(service)
            .properties(bag([("service", some(service))]));
        self.track_event("service_view", EventCategory::Content, options).await
    }

    async fn track_service_click(&self, service: &str, action: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(format!("{} - {}", service, action))
            .properties(bag([("service", some(service)), ("action", some(action))]));
        self.track_event("service_click", EventCategory::Engagement, options).await
    }

    async fn track_scroll_depth(&self, depth: u8, path: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(format!("{}%", depth))
            .value(depth as f64)
            .properties(bag([("depth", some(depth)), ("path", some(path))]));
        self.track_event("scroll_depth", EventCategory::Engagement, options).await
    }

    async fn track_time_on_page(&self, seconds: u64, path: &str) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(format!("{}s", seconds))
            .value(seconds as f64)
            .properties(bag([("seconds", some(seconds)), ("path", some(path))]));
        self.track_event("time_on_page", EventCategory::Engagement, options).await
    }

    async fn track_page_visibility(&self, visible: bool) -> Option<AnalyticsEvent> {
        let options = EventOptions::new()
            .label(if visible { "visible" } else { "hidden" })
            .value(outcome(visible));
        self.track_event("page_visibility", EventCategory::Engagement, options).await
    }

    async fn track_error(
        &self,
        error: &str,
        source: Option<&str>,
        properties: Option<Map<String, Value>>,
    ) -> Option<AnalyticsEvent> {
        let base = bag([("error", some(error)), ("source", source.map(Value::from))]);
        let options = EventOptions::new()
            .label(error)
            .properties(merged(base, properties));
        self.track_event("error_occurred", EventCategory::Error, options).await
    }
}

impl<T: TrackEvent + ?Sized> EventCatalog for T {}
