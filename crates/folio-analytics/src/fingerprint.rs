//! Device fingerprint resolution
//!
//! A fingerprint identifies a browser profile across visits. It is resolved at
//! most once per [`FingerprintResolver`]: stored value first, then the primary
//! [`FingerprintAgent`], then a deterministic fallback hash. Whatever wins is
//! persisted to long-lived storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::{to_base36, ClientStorage, StorageKeys};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::environment::{BrowserEnvironment, SharedEnvironment};
use crate::error::FingerprintError;
use crate::locked;

/// What a fingerprint agent reports about the current browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub visitor_id: String,
    /// Agent's confidence in the identification, in `0.0..=1.0`
    pub confidence: f64,
    pub components: Map<String, Value>,
}

#[async_trait]
pub trait FingerprintAgent: Send + Sync {
    async fn get(&self, env: &BrowserEnvironment) -> Result<AgentResult, FingerprintError>;
}

/// Default agent: SHA-256 over the environment's identifying characteristics
#[derive(Debug, Default, Clone, Copy)]
pub struct HashingAgent;

impl HashingAgent {
    fn components(env: &BrowserEnvironment) -> Map<String, Value> {
        let value = json!({
            "userAgent": env.user_agent,
            "language": env.language,
            "languages": env.languages,
            "screenResolution": [env.screen_width, env.screen_height],
            "colorDepth": env.color_depth,
            "pixelRatio": env.pixel_ratio,
            "timezone": env.timezone,
            "timezoneOffset": env.timezone_offset,
            "hardwareConcurrency": env.hardware_concurrency,
            "maxTouchPoints": env.max_touch_points,
            "touchSupport": env.touch_support(),
            "cookiesEnabled": env.cookies_enabled,
            "doNotTrack": env.do_not_track,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(is_populated),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => true,
    }
}

#[async_trait]
impl FingerprintAgent for HashingAgent {
    async fn get(&self, env: &BrowserEnvironment) -> Result<AgentResult, FingerprintError> {
        if env.user_agent.trim().is_empty() {
            return Err(FingerprintError::Unavailable(
                "no user agent in the environment".to_string(),
            ));
        }

        let components = Self::components(env);
        let encoded = serde_json::to_string(&components)
            .map_err(|e| FingerprintError::Agent(e.to_string()))?;
        let digest = Sha256::digest(encoded.as_bytes());
        let populated = components.values().filter(|v| is_populated(v)).count();

        Ok(AgentResult {
            visitor_id: hex::encode(&digest[..16]),
            confidence: populated as f64 / components.len().max(1) as f64,
            components,
        })
    }
}

/// Rolling 32-bit hash over the characteristics available without an agent.
///
/// Stable for identical inputs, and bit-compatible with fingerprints minted by
/// earlier browser builds: the hash runs over UTF-16 code units with wrapping
/// `i32` arithmetic.
pub fn fallback_fingerprint(env: &BrowserEnvironment) -> String {
    let joined = [
        env.user_agent.clone(),
        env.language.clone(),
        env.screen_width.to_string(),
        env.screen_height.to_string(),
        env.color_depth.to_string(),
        env.timezone_offset.to_string(),
        env.hardware_concurrency.to_string(),
        env.max_touch_points.to_string(),
    ]
    .join("|");

    let hash = joined.encode_utf16().fold(0i32, |acc, unit| {
        acc.wrapping_shl(5).wrapping_sub(acc).wrapping_add(unit as i32)
    });

    format!("fallback-{}", to_base36(hash.unsigned_abs() as u128))
}

/// Result of [`FingerprintResolver::extended`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedFingerprint {
    pub visitor_id: String,
    pub confidence: f64,
    pub components: Map<String, Value>,
}

pub struct FingerprintResolver {
    agent: Arc<dyn FingerprintAgent>,
    storage: Arc<dyn ClientStorage>,
    env: SharedEnvironment,
    use_agent: bool,
    memo: Mutex<Arc<OnceCell<String>>>,
}

impl FingerprintResolver {
    pub fn new(
        agent: Arc<dyn FingerprintAgent>,
        storage: Arc<dyn ClientStorage>,
        env: SharedEnvironment,
    ) -> Self {
        Self {
            agent,
            storage,
            env,
            use_agent: true,
            memo: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// With the agent disabled the fallback hash is used directly
    pub fn with_agent_enabled(mut self, enabled: bool) -> Self {
        self.use_agent = enabled;
        self
    }

    fn memo(&self) -> Arc<OnceCell<String>> {
        locked(&self.memo).clone()
    }

    /// Resolve the fingerprint; concurrent callers share one resolution
    pub async fn resolve(&self) -> String {
        let memo = self.memo();
        memo.get_or_init(|| self.compute()).await.clone()
    }

    async fn compute(&self) -> String {
        if let Some(stored) = self.storage.get(StorageKeys::FINGERPRINT) {
            if !stored.is_empty() {
                return stored;
            }
        }

        let env = self.env.snapshot();
        let fingerprint = if self.use_agent {
            match self.agent.get(&env).await {
                Ok(result) => result.visitor_id,
                Err(e) => {
                    warn!("Fingerprint agent failed, using fallback hash: {}", e);
                    fallback_fingerprint(&env)
                }
            }
        } else {
            fallback_fingerprint(&env)
        };

        if let Err(e) = self.storage.set(StorageKeys::FINGERPRINT, &fingerprint) {
            warn!("Failed to persist fingerprint: {}", e);
        }
        debug!("Resolved fingerprint {}", fingerprint);
        fingerprint
    }

    /// Agent output with its components, or the resolved id with zero
    /// confidence when the agent is unavailable
    pub async fn extended(&self) -> ExtendedFingerprint {
        if self.use_agent {
            match self.agent.get(&self.env.snapshot()).await {
                Ok(result) => {
                    return ExtendedFingerprint {
                        visitor_id: result.visitor_id,
                        confidence: result.confidence,
                        components: result.components,
                    }
                }
                Err(e) => warn!("Extended fingerprint failed: {}", e),
            }
        }

        ExtendedFingerprint {
            visitor_id: self.resolve().await,
            confidence: 0.0,
            components: Map::new(),
        }
    }

    /// Forget the memoized and stored fingerprint
    pub fn clear_cache(&self) {
        *locked(&self.memo) = Arc::new(OnceCell::new());
        if let Err(e) = self.storage.remove(StorageKeys::FINGERPRINT) {
            warn!("Failed to remove stored fingerprint: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingAgent;

    #[async_trait]
    impl FingerprintAgent for FailingAgent {
        async fn get(&self, _env: &BrowserEnvironment) -> Result<AgentResult, FingerprintError> {
            Err(FingerprintError::Agent("blocked by extension".to_string()))
        }
    }

    struct CountingAgent(AtomicUsize);

    #[async_trait]
    impl FingerprintAgent for CountingAgent {
        async fn get(&self, env: &BrowserEnvironment) -> Result<AgentResult, FingerprintError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            HashingAgent.get(env).await
        }
    }

    fn env() -> BrowserEnvironment {
        BrowserEnvironment::default()
            .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0")
            .with_screen(1920, 1080, 24)
            .with_timezone("Europe/Madrid", -60)
    }

    #[test]
    fn test_fallback_is_stable_and_input_sensitive() {
        let a = fallback_fingerprint(&env());
        assert!(a.starts_with("fallback-"));
        assert_eq!(a, fallback_fingerprint(&env()));

        let other = env().with_screen(1280, 720, 24);
        assert_ne!(a, fallback_fingerprint(&other));
    }

    #[test]
    fn test_fallback_hash_matches_reference_value() {
        // "a|b|0|0|0|0|0|0" hashed with the 32-bit rolling hash
        let mut env = BrowserEnvironment::default();
        env.user_agent = "a".to_string();
        env.language = "b".to_string();
        let expected = "a|b|0|0|0|0|0|0".encode_utf16().fold(0i64, |acc, unit| {
            let next = (acc << 5) - acc + unit as i64;
            next as i32 as i64
        });
        assert_eq!(
            fallback_fingerprint(&env),
            format!("fallback-{}", to_base36(expected.unsigned_abs() as u128))
        );
    }

    #[tokio::test]
    async fn test_agent_failure_falls_back_and_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let resolver = FingerprintResolver::new(
            Arc::new(FailingAgent),
            storage.clone(),
            SharedEnvironment::new(env()),
        );

        let fp = resolver.resolve().await;
        assert_eq!(fp, fallback_fingerprint(&env()));
        assert_eq!(storage.get(StorageKeys::FINGERPRINT), Some(fp.clone()));

        let extended = resolver.extended().await;
        assert_eq!(extended.visitor_id, fp);
        assert_eq!(extended.confidence, 0.0);
        assert!(extended.components.is_empty());
    }

    #[tokio::test]
    async fn test_stored_fingerprint_wins() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(StorageKeys::FINGERPRINT, "stored-fp").unwrap();
        let resolver = FingerprintResolver::new(
            Arc::new(HashingAgent),
            storage,
            SharedEnvironment::new(env()),
        );
        assert_eq!(resolver.resolve().await, "stored-fp");
    }

    #[tokio::test]
    async fn test_concurrent_resolution_runs_agent_once() {
        let agent = Arc::new(CountingAgent(AtomicUsize::new(0)));
        let resolver = Arc::new(FingerprintResolver::new(
            agent.clone(),
            Arc::new(MemoryStorage::new()),
            SharedEnvironment::new(env()),
        ));

        let (a, b) = tokio::join!(resolver.resolve(), resolver.resolve());
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_eq!(agent.0.load(Ordering::SeqCst), 1);

        resolver.clear_cache();
        assert_eq!(resolver.resolve().await, a);
        assert_eq!(agent.0.load(Ordering::SeqCst), 2);
    }
}
