use std::collections::BTreeMap;

use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};

/// Counters aggregated per UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `pageviews`, `events` and one `event_<name>` counter per event name
    pub metrics: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<UtcDateTime>,
}

impl DailyStats {
    pub const PAGEVIEWS: &'static str = "pageviews";
    pub const EVENTS: &'static str = "events";

    pub fn event_metric(name: &str) -> String {
        format!("event_{}", name)
    }

    pub fn get(&self, metric: &str) -> i64 {
        self.metrics.get(metric).copied().unwrap_or(0)
    }

    pub fn pageviews(&self) -> i64 {
        self.get(Self::PAGEVIEWS)
    }

    pub fn events(&self) -> i64 {
        self.get(Self::EVENTS)
    }
}
