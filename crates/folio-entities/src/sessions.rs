use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;
use crate::geo::GeoInfo;
use crate::referrer::{ReferrerInfo, UtmParams};

/// A bounded period of activity by one visitor in one tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub visitor_id: String,
    pub fingerprint: String,
    pub started_at: UtcDateTime,
    pub last_activity_at: UtcDateTime,
    /// Milliseconds between `started_at` and the latest activity
    pub duration: u64,
    pub pageviews: u32,
    pub events: u32,
    pub device: DeviceInfo,
    pub geo: GeoInfo,
    pub referrer: ReferrerInfo,
    #[serde(default)]
    pub utm: UtmParams,
    pub is_bot: bool,
    pub is_bounce: bool,
    /// Crawler name, only recorded for bot sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
}
