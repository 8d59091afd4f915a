use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the visitor's device, browser and display capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub pixel_ratio: f64,
    pub color_depth: u32,
    pub touch_support: bool,
    pub language: String,
    pub languages: Vec<String>,
    pub timezone: String,
    pub cookies_enabled: bool,
    pub do_not_track: bool,
    pub user_agent: String,
}

impl Default for DeviceInfo {
    /// Placeholder used when no host environment is available
    fn default() -> Self {
        Self {
            device_type: DeviceType::Unknown,
            os: "Unknown".to_string(),
            os_version: String::new(),
            browser: "Unknown".to_string(),
            browser_version: String::new(),
            screen_width: 0,
            screen_height: 0,
            viewport_width: 0,
            viewport_height: 0,
            pixel_ratio: 1.0,
            color_depth: 0,
            touch_support: false,
            language: "en".to_string(),
            languages: vec!["en".to_string()],
            timezone: "UTC".to_string(),
            cookies_enabled: false,
            do_not_track: false,
            user_agent: String::new(),
        }
    }
}
