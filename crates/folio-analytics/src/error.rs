use folio_core::ConfigError;
use thiserror::Error;

/// Misuse of the tracking API. Runtime and environment failures never
/// surface here: they degrade to fallback values or are logged and dropped.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Analytics is not mounted: call AnalyticsProvider::mount() before using the tracking API")]
    NotMounted,
    #[error("Analytics provider is already mounted")]
    AlreadyMounted,
    #[error("Analytics provider has been torn down and cannot be reused")]
    TornDown,
    #[error("Invalid analytics configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FingerprintError {
    #[error("Fingerprint agent unavailable: {0}")]
    Unavailable(String),
    #[error("Fingerprint agent failed: {0}")]
    Agent(String),
}
