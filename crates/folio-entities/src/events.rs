use folio_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Engagement,
    Conversion,
    Navigation,
    Social,
    Content,
    Error,
    Performance,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Engagement => "engagement",
            EventCategory::Conversion => "conversion",
            EventCategory::Navigation => "navigation",
            EventCategory::Social => "social",
            EventCategory::Content => "content",
            EventCategory::Error => "error",
            EventCategory::Performance => "performance",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, categorized user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: String,
    pub session_id: String,
    pub visitor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pageview_id: Option<String>,
    pub category: EventCategory,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    pub timestamp: UtcDateTime,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_absent_optionals_are_not_serialized() {
        let event = AnalyticsEvent {
            id: "e-1".to_string(),
            session_id: "s-1".to_string(),
            visitor_id: "v-1".to_string(),
            pageview_id: None,
            category: EventCategory::Engagement,
            name: "code_copied".to_string(),
            label: None,
            value: None,
            properties: None,
            timestamp: Utc::now(),
            path: "/blog/rust".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("pageviewId"));
        assert!(!obj.contains_key("label"));
        assert!(!obj.contains_key("properties"));
        assert_eq!(obj["category"], "engagement");
        assert_eq!(obj["sessionId"], "s-1");

        let back: AnalyticsEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
