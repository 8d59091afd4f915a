use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;
use crate::performance::PerformanceMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pageview {
    pub id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub path: String,
    pub title: String,
    pub referrer: String,
    pub timestamp: UtcDateTime,
    /// Milliseconds, only meaningful once the pageview has ended
    pub time_on_page: u64,
    /// Deepest scroll percentage reached, `0..=100`
    pub scroll_depth: u8,
    pub device: DeviceInfo,
    #[serde(default)]
    pub performance: PerformanceMetrics,
}

impl Pageview {
    /// Raise the recorded scroll depth; lower samples are ignored
    pub fn record_scroll_depth(&mut self, depth: u8) {
        let depth = depth.min(100);
        if depth > self.scroll_depth {
            self.scroll_depth = depth;
        }
    }
}
