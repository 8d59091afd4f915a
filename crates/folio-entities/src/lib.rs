//! Data model of the analytics tracking core
//!
//! Field names serialize in camelCase and optional attributes are omitted when
//! unset, so these shapes double as the stored document schema.

pub mod daily_stats;
pub mod dashboard;
pub mod device;
pub mod events;
pub mod geo;
pub mod pageviews;
pub mod performance;
pub mod referrer;
pub mod sessions;
pub mod visitors;

pub use daily_stats::DailyStats;
pub use dashboard::{
    BrowserStat, CountryStat, DashboardMetrics, DeviceBreakdown, EventStat, Overview, PageStat,
    Period, ReferrerStat, Trends,
};
pub use device::{DeviceInfo, DeviceType};
pub use events::{AnalyticsEvent, EventCategory};
pub use geo::{GeoInfo, GeoSource};
pub use pageviews::Pageview;
pub use performance::{PerformanceMetrics, WebVital};
pub use referrer::{ReferrerInfo, ReferrerType, UtmParams};
pub use sessions::Session;
pub use visitors::Visitor;
