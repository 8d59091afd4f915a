//! # folio-analytics
//!
//! Client-side tracking core: visitor identity, sessions, pageviews, custom
//! events and scroll depth, persisted through [`folio_store::AnalyticsStore`].
//!
//! ```rust,no_run
//! use folio_analytics::{AnalyticsProvider, BrowserEnvironment, EventCatalog, TrackingContext};
//! use folio_core::AnalyticsConfig;
//!
//! # async fn example() -> Result<(), folio_analytics::AnalyticsError> {
//! let env = BrowserEnvironment::at("https://example.com/blog/my-post");
//! let provider = AnalyticsProvider::new(TrackingContext::builder(AnalyticsConfig::default(), env).build()?);
//! provider.mount().await?;
//!
//! let analytics = provider.analytics()?;
//! analytics.track_pageview(None, None).await;
//! analytics.track_cv_download(Some("PDF")).await;
//!
//! provider.unmount().await?;
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod channel;
pub mod device;
pub mod environment;
pub mod error;
pub mod fingerprint;
pub mod page_tracking;
pub mod provider;
pub mod session;
pub mod tracking;

pub use bot::{crawler_name, is_bot, BOT_PATTERNS};
pub use channel::{classify_referrer, extract_referrer_hostname, parse_utm_params};
pub use device::{device_info, DeviceDetector};
pub use environment::{BrowserEnvironment, Location, PerformanceTiming, SharedEnvironment};
pub use error::{AnalyticsError, FingerprintError};
pub use fingerprint::{
    fallback_fingerprint, AgentResult, ExtendedFingerprint, FingerprintAgent, FingerprintResolver,
    HashingAgent,
};
pub use page_tracking::{ArticleReadTracker, PageTracker};
pub use provider::{
    Analytics, AnalyticsProvider, GateReason, ProviderState, TrackingContext,
    TrackingContextBuilder,
};
pub use session::{ClientStorages, SessionListener, SessionManager};
pub use tracking::*;

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn locked<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
