use std::collections::HashMap;

use folio_core::config::{AnalyticsConfig, FeatureFlags};
use folio_core::ConfigError;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_analytics_config_default() {
    let config = AnalyticsConfig::default();

    assert!(config.enabled);
    assert!(!config.debug);
    assert!(!config.track_bots);
    assert_eq!(config.session_timeout_ms, 1_800_000);
    assert_eq!(config.heartbeat_interval_ms, 30_000);
    assert_eq!(config.scroll_thresholds, vec![25, 50, 75, 90, 100]);
    assert_eq!(config.sample_rate, 1.0);
    assert_eq!(config.batch_size, 10);
    assert_eq!(config.flush_interval_ms, 5_000);
    assert_eq!(config.features, FeatureFlags::default());
    assert_eq!(
        config.exclude_paths,
        vec!["/admin", "/admin/*", "/api/*", "/_next/*", "/favicon.ico"]
    );
}

#[test]
fn test_analytics_config_from_lookup_overrides() {
    let config = AnalyticsConfig::from_lookup(lookup_from(&[
        ("FOLIO_ANALYTICS_ENABLED", "false"),
        ("FOLIO_ANALYTICS_DEBUG", "1"),
        ("FOLIO_ANALYTICS_SESSION_TIMEOUT_MS", "60000"),
        ("FOLIO_ANALYTICS_SCROLL_THRESHOLDS", "10, 50 ,90"),
        ("FOLIO_ANALYTICS_EXCLUDE_PATHS", "/private/*, /draft"),
        ("FOLIO_ANALYTICS_SAMPLE_RATE", "0.25"),
        ("FOLIO_ANALYTICS_BATCH_SIZE", "3"),
    ]))
    .unwrap();

    assert!(!config.enabled);
    assert!(config.debug);
    assert_eq!(config.session_timeout_ms, 60_000);
    assert_eq!(config.scroll_thresholds, vec![10, 50, 90]);
    assert_eq!(config.exclude_paths, vec!["/private/*", "/draft"]);
    assert_eq!(config.sample_rate, 0.25);
    assert_eq!(config.batch_size, 3);
    // untouched values keep their defaults
    assert_eq!(config.flush_interval_ms, 5_000);
    assert_eq!(config.heartbeat_interval_ms, 30_000);
}

#[test]
fn test_analytics_config_rejects_bad_values() {
    let err = AnalyticsConfig::from_lookup(lookup_from(&[("FOLIO_ANALYTICS_BATCH_SIZE", "many")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "FOLIO_ANALYTICS_BATCH_SIZE"));

    let err = AnalyticsConfig::from_lookup(lookup_from(&[("FOLIO_ANALYTICS_SAMPLE_RATE", "1.5")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));

    let err = AnalyticsConfig::from_lookup(lookup_from(&[("FOLIO_ANALYTICS_BATCH_SIZE", "0")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn test_path_exclusion() {
    let config = AnalyticsConfig::default();

    assert!(config.is_path_excluded("/admin"));
    assert!(config.is_path_excluded("/admin/analytics"));
    assert!(config.is_path_excluded("/api/contact"));
    assert!(config.is_path_excluded("/favicon.ico"));

    assert!(!config.is_path_excluded("/blog/admin-tips"));
    assert!(!config.is_path_excluded("/administrator"));
    assert!(!config.is_path_excluded("/"));
}

#[test]
fn test_normalized_thresholds() {
    let config = AnalyticsConfig {
        scroll_thresholds: vec![90, 25, 50, 25, 100],
        ..Default::default()
    };
    assert_eq!(config.normalized_thresholds(), vec![25, 50, 90, 100]);
}

#[test]
fn test_analytics_config_serialization() {
    let config = AnalyticsConfig::default();
    let serialized = serde_json::to_string(&config).unwrap();
    assert!(serialized.contains("\"sessionTimeoutMs\":1800000"));

    let deserialized: AnalyticsConfig = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized.scroll_thresholds, config.scroll_thresholds);
    assert_eq!(deserialized.exclude_paths, config.exclude_paths);
}
