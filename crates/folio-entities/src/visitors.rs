use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;
use crate::geo::GeoInfo;
use crate::sessions::Session;

/// A browser identity that persists across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    pub id: String,
    pub fingerprint: String,
    pub first_seen_at: UtcDateTime,
    pub last_seen_at: UtcDateTime,
    pub total_sessions: u64,
    pub total_pageviews: u64,
    pub total_events: u64,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
    #[serde(default)]
    pub locations: Vec<GeoInfo>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Visitor {
    /// Record of a visitor as first seen in `session`
    pub fn first_seen(session: &Session) -> Self {
        Self {
            id: session.visitor_id.clone(),
            fingerprint: session.fingerprint.clone(),
            first_seen_at: session.started_at,
            last_seen_at: session.started_at,
            total_sessions: 1,
            total_pageviews: 0,
            total_events: 0,
            devices: vec![session.device.clone()],
            locations: Vec::new(),
            tags: Vec::new(),
        }
    }
}
