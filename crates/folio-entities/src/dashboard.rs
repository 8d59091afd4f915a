//! Read-side aggregates shown on the admin dashboard

use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::events::EventCategory;
use crate::referrer::ReferrerType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_visitors: u64,
    pub unique_visitors: u64,
    pub total_sessions: u64,
    pub total_pageviews: u64,
    pub total_events: u64,
    /// Milliseconds
    pub avg_session_duration: f64,
    /// Percentage, `0..=100`
    pub bounce_rate: f64,
    pub returning_visitors: u64,
}

/// Relative change against the previous period of equal length, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub visitors_change: f64,
    pub pageviews_change: f64,
    pub session_duration_change: f64,
    pub bounce_rate_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStat {
    pub path: String,
    pub title: String,
    pub views: u64,
    pub unique_views: u64,
    pub avg_time_on_page: f64,
    pub bounce_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferrerStat {
    pub domain: String,
    #[serde(rename = "type")]
    pub referrer_type: ReferrerType,
    pub sessions: u64,
    pub conversions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeviceBreakdown {
    pub desktop: u64,
    pub mobile: u64,
    pub tablet: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserStat {
    pub name: String,
    pub sessions: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryStat {
    pub code: String,
    pub name: String,
    pub sessions: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStat {
    pub name: String,
    pub category: EventCategory,
    pub count: u64,
    pub unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub period: Period,
    pub overview: Overview,
    pub trends: Trends,
    pub top_pages: Vec<PageStat>,
    pub top_referrers: Vec<ReferrerStat>,
    pub devices: DeviceBreakdown,
    pub browsers: Vec<BrowserStat>,
    pub countries: Vec<CountryStat>,
    pub events: Vec<EventStat>,
}

impl DashboardMetrics {
    pub fn empty(start: UtcDateTime, end: UtcDateTime) -> Self {
        Self {
            period: Period { start, end },
            overview: Overview::default(),
            trends: Trends::default(),
            top_pages: Vec::new(),
            top_referrers: Vec::new(),
            devices: DeviceBreakdown::default(),
            browsers: Vec::new(),
            countries: Vec::new(),
            events: Vec::new(),
        }
    }
}
