use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session arrived at the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferrerType {
    #[default]
    Direct,
    Organic,
    Social,
    Referral,
    Email,
    Paid,
    Unknown,
}

impl ReferrerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferrerType::Direct => "direct",
            ReferrerType::Organic => "organic",
            ReferrerType::Social => "social",
            ReferrerType::Referral => "referral",
            ReferrerType::Email => "email",
            ReferrerType::Paid => "paid",
            ReferrerType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReferrerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReferrerInfo {
    pub raw: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub referrer_type: ReferrerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_network: Option<String>,
}

impl ReferrerInfo {
    pub fn direct() -> Self {
        Self::default()
    }
}

/// UTM campaign parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UtmParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UtmParams {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.medium.is_none()
            && self.campaign.is_none()
            && self.term.is_none()
            && self.content.is_none()
    }
}
