/// Keys used in long-lived (browser-wide) and tab-scoped client storage.
pub struct StorageKeys;

impl StorageKeys {
    /// Long-lived: persistent visitor identity
    pub const VISITOR_ID: &'static str = "folio_visitor_id";
    /// Long-lived: cached device fingerprint
    pub const FINGERPRINT: &'static str = "folio_fingerprint";
    /// Tab-scoped: current session id
    pub const SESSION_ID: &'static str = "folio_session_id";
    /// Tab-scoped: epoch millis of the last recorded activity
    pub const LAST_ACTIVITY: &'static str = "folio_last_activity";
    /// Tab-scoped: epoch millis at which the current session started
    pub const SESSION_START: &'static str = "folio_session_start";
}

/// Environment variable prefix for analytics configuration
pub const ENV_PREFIX: &str = "FOLIO_ANALYTICS_";
