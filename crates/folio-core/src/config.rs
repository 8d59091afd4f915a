//! Configuration management utilities

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::ENV_PREFIX;
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30 * 1000;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5 * 1000;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SCROLL_THRESHOLDS: [u8; 5] = [25, 50, 75, 90, 100];
pub const DEFAULT_EXCLUDE_PATHS: [&str; 5] = ["/admin", "/admin/*", "/api/*", "/_next/*", "/favicon.ico"];

/// Optional tracking features that can be switched off independently
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub fingerprinting: bool,
    pub geolocation: bool,
    pub performance: bool,
    pub scroll_tracking: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            fingerprinting: true,
            geolocation: true,
            performance: true,
            scroll_tracking: true,
        }
    }
}

/// Tracking configuration shared by every component of a tracking context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub debug: bool,
    pub track_bots: bool,
    pub session_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub scroll_thresholds: Vec<u8>,
    pub scroll_throttle_ms: u64,
    pub resize_debounce_ms: u64,
    pub exclude_paths: Vec<String>,
    pub exclude_ips: Vec<String>,
    /// Fraction of page-render contexts that are tracked, in `0.0..=1.0`
    pub sample_rate: f64,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub retry_attempts: u32,
    pub features: FeatureFlags,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            track_bots: false,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            scroll_thresholds: DEFAULT_SCROLL_THRESHOLDS.to_vec(),
            scroll_throttle_ms: 100,
            resize_debounce_ms: 250,
            exclude_paths: DEFAULT_EXCLUDE_PATHS.iter().map(|p| p.to_string()).collect(),
            exclude_ips: Vec::new(),
            sample_rate: 1.0,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            retry_attempts: 3,
            features: FeatureFlags::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Build a configuration from `FOLIO_ANALYTICS_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            enabled: parse_or(get("ENABLED"), "ENABLED", defaults.enabled, parse_bool)?,
            debug: parse_or(get("DEBUG"), "DEBUG", defaults.debug, parse_bool)?,
            track_bots: parse_or(get("TRACK_BOTS"), "TRACK_BOTS", defaults.track_bots, parse_bool)?,
            session_timeout_ms: parse_or(
                get("SESSION_TIMEOUT_MS"),
                "SESSION_TIMEOUT_MS",
                defaults.session_timeout_ms,
                |s| s.parse().ok(),
            )?,
            heartbeat_interval_ms: parse_or(
                get("HEARTBEAT_INTERVAL_MS"),
                "HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
                |s| s.parse().ok(),
            )?,
            scroll_thresholds: parse_or(
                get("SCROLL_THRESHOLDS"),
                "SCROLL_THRESHOLDS",
                defaults.scroll_thresholds.clone(),
                |s| s.split(',').map(|t| t.trim().parse::<u8>().ok()).collect(),
            )?,
            exclude_paths: get("EXCLUDE_PATHS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| defaults.exclude_paths.clone()),
            sample_rate: parse_or(get("SAMPLE_RATE"), "SAMPLE_RATE", defaults.sample_rate, |s| {
                s.parse().ok()
            })?,
            batch_size: parse_or(get("BATCH_SIZE"), "BATCH_SIZE", defaults.batch_size, |s| {
                s.parse().ok()
            })?,
            flush_interval_ms: parse_or(
                get("FLUSH_INTERVAL_MS"),
                "FLUSH_INTERVAL_MS",
                defaults.flush_interval_ms,
                |s| s.parse().ok(),
            )?,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the trackers misbehave
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.sample_rate) || self.sample_rate.is_nan() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}SAMPLE_RATE", ENV_PREFIX),
                value: self.sample_rate.to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "batch size must be at least 1".to_string(),
            });
        }
        if self.session_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "session timeout must be positive".to_string(),
            });
        }
        if let Some(t) = self.scroll_thresholds.iter().find(|t| **t > 100) {
            return Err(ConfigError::InvalidValue {
                key: format!("{}SCROLL_THRESHOLDS", ENV_PREFIX),
                value: t.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `path` matches one of the excluded path patterns.
    ///
    /// A pattern ending in `*` matches any path starting with the pattern
    /// minus the `*`; every other pattern must match exactly.
    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == pattern,
        })
    }

    pub fn is_ip_excluded(&self, ip: &str) -> bool {
        self.exclude_ips.iter().any(|excluded| excluded == ip)
    }

    /// Thresholds sorted ascending with duplicates removed
    pub fn normalized_thresholds(&self) -> Vec<u8> {
        let mut thresholds = self.scroll_thresholds.clone();
        thresholds.sort_unstable();
        thresholds.dedup();
        thresholds
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_or<T, P>(raw: Option<String>, name: &str, default: T, parse: P) -> ConfigResult<T>
where
    P: Fn(&str) -> Option<T>,
{
    match raw {
        None => Ok(default),
        Some(value) => parse(&value).ok_or_else(|| ConfigError::InvalidValue {
            key: format!("{}{}", ENV_PREFIX, name),
            value,
        }),
    }
}
