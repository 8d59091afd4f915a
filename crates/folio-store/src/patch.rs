//! Partial updates of stored entities

use folio_core::UtcDateTime;
use folio_entities::{GeoInfo, Pageview, PerformanceMetrics, Session};
use serde::Serialize;

/// Fields of a session that change after it is first saved
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<UtcDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pageviews: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bounce: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,
}

impl SessionPatch {
    /// Activity counters and timing of a session's current state
    pub fn activity(session: &Session) -> Self {
        Self {
            last_activity_at: Some(session.last_activity_at),
            duration: Some(session.duration),
            pageviews: Some(session.pageviews),
            events: Some(session.events),
            is_bounce: Some(session.is_bounce),
            geo: None,
        }
    }

    pub fn geo(geo: GeoInfo) -> Self {
        Self {
            geo: Some(geo),
            ..Default::default()
        }
    }
}

/// Fields of a pageview that are only known once it ends
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageviewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_on_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
}

impl PageviewPatch {
    pub fn finished(pageview: &Pageview) -> Self {
        Self {
            time_on_page: Some(pageview.time_on_page),
            scroll_depth: Some(pageview.scroll_depth),
            performance: Some(pageview.performance),
        }
    }
}
