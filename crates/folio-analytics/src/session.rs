//! Visitor and session identity
//!
//! The visitor id lives in long-lived storage shared by every tab; the session
//! id and its last-activity stamp live in per-tab storage. A session stays
//! valid while it has seen activity within the configured timeout.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::{
    elapsed_millis, epoch_millis, from_epoch_millis, generate_id, AnalyticsConfig, ClientStorage,
    Clock, MemoryStorage, StorageKeys, TaskHandle, UtcDateTime,
};
use folio_entities::{GeoInfo, Session};
use folio_geo::CachedGeolocation;
use tracing::{debug, warn};

use crate::bot::{crawler_name, is_bot};
use crate::channel::{classify_referrer, parse_utm_params};
use crate::device::DeviceDetector;
use crate::environment::SharedEnvironment;
use crate::fingerprint::FingerprintResolver;
use crate::locked;

/// Long-lived storage (shared across tabs) and tab-scoped storage
#[derive(Clone)]
pub struct ClientStorages {
    pub local: Arc<dyn ClientStorage>,
    pub tab: Arc<dyn ClientStorage>,
}

impl ClientStorages {
    pub fn new(local: Arc<dyn ClientStorage>, tab: Arc<dyn ClientStorage>) -> Self {
        Self { local, tab }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    /// A new tab of the same browser: shared long-lived storage, fresh tab storage
    pub fn new_tab(&self) -> Self {
        Self::new(self.local.clone(), Arc::new(MemoryStorage::new()))
    }
}

fn read_millis(storage: &dyn ClientStorage, key: &str) -> Option<UtcDateTime> {
    storage
        .get(key)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(from_epoch_millis)
}

/// Final state of a session that timed out: its duration ends at its last
/// recorded activity
fn finalize(mut session: Session) -> Session {
    session.duration = elapsed_millis(session.started_at, session.last_activity_at);
    session
}

fn store_key(storage: &dyn ClientStorage, key: &str, value: &str) {
    if let Err(e) = storage.set(key, value) {
        warn!("Failed to write {} to client storage: {}", key, e);
    }
}

/// Refresh activity of the in-memory session and the tab's last-activity stamp
fn touch(state: &Mutex<Option<Session>>, tab: &dyn ClientStorage, now: UtcDateTime) {
    {
        let mut guard = locked(state);
        let Some(session) = guard.as_mut() else {
            return;
        };
        session.last_activity_at = now;
        session.duration = elapsed_millis(session.started_at, now);
    }
    store_key(tab, StorageKeys::LAST_ACTIVITY, &epoch_millis(now).to_string());
}

/// Hears about sessions as the manager opens them
#[async_trait]
pub trait SessionListener: Send + Sync {
    /// A new session id was minted. `expired` is the final state of the
    /// in-memory session it replaces, if any.
    async fn session_started(&self, session: &Session, expired: Option<Session>);

    /// A still-valid id was picked up with no in-memory record, as after a
    /// reload. Returns the persisted record to continue from.
    async fn session_resumed(&self, rebuilt: &Session) -> Option<Session>;
}

pub struct SessionManager {
    config: Arc<AnalyticsConfig>,
    clock: Arc<dyn Clock>,
    storages: ClientStorages,
    env: SharedEnvironment,
    fingerprint: Arc<FingerprintResolver>,
    device: Arc<DeviceDetector>,
    geo: Option<Arc<CachedGeolocation>>,
    state: Arc<Mutex<Option<Session>>>,
    heartbeat: Mutex<Option<TaskHandle>>,
    listener: Mutex<Option<Arc<dyn SessionListener>>>,
    creation: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(
        config: Arc<AnalyticsConfig>,
        clock: Arc<dyn Clock>,
        storages: ClientStorages,
        env: SharedEnvironment,
        fingerprint: Arc<FingerprintResolver>,
        device: Arc<DeviceDetector>,
    ) -> Self {
        Self {
            config,
            clock,
            storages,
            env,
            fingerprint,
            device,
            geo: None,
            state: Arc::new(Mutex::new(None)),
            heartbeat: Mutex::new(None),
            listener: Mutex::new(None),
            creation: tokio::sync::Mutex::new(()),
        }
    }

    /// Source of cached geolocation for new sessions
    pub fn with_geolocation(mut self, geo: Arc<CachedGeolocation>) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Persistent visitor id, created on first use
    pub fn visitor_id(&self) -> String {
        if let Some(id) = self.storages.local.get(StorageKeys::VISITOR_ID) {
            if !id.is_empty() {
                return id;
            }
        }
        let id = generate_id("v", self.clock.now());
        store_key(self.storages.local.as_ref(), StorageKeys::VISITOR_ID, &id);
        debug!("Created visitor {}", id);
        id
    }

    /// True until a visitor id has been stored for this browser
    pub fn is_new_visitor(&self) -> bool {
        self.storages
            .local
            .get(StorageKeys::VISITOR_ID)
            .map(|id| id.is_empty())
            .unwrap_or(true)
    }

    /// Current session id. A valid read refreshes last activity; an expired
    /// or missing session mints a new id.
    pub fn session_id(&self) -> String {
        self.resolve_id().0
    }

    /// Session id for this tab and whether it was minted by this call
    fn resolve_id(&self) -> (String, bool) {
        let now = self.clock.now();
        let tab = self.storages.tab.as_ref();
        let timeout = self.config.session_timeout().as_millis() as u64;

        let stored = tab.get(StorageKeys::SESSION_ID).filter(|id| !id.is_empty());
        let last_activity = read_millis(tab, StorageKeys::LAST_ACTIVITY);

        if let (Some(id), Some(last)) = (stored, last_activity) {
            if elapsed_millis(last, now) < timeout {
                store_key(tab, StorageKeys::LAST_ACTIVITY, &epoch_millis(now).to_string());
                return (id, false);
            }
            debug!("Session {} expired", id);
        }

        let id = generate_id("s", now);
        let millis = epoch_millis(now).to_string();
        store_key(tab, StorageKeys::SESSION_ID, &id);
        store_key(tab, StorageKeys::SESSION_START, &millis);
        store_key(tab, StorageKeys::LAST_ACTIVITY, &millis);
        (id, true)
    }

    /// Observer of session starts, registered while tracking is active
    pub fn set_listener(&self, listener: Arc<dyn SessionListener>) {
        *locked(&self.listener) = Some(listener);
    }

    pub fn clear_listener(&self) {
        locked(&self.listener).take();
    }

    fn listener(&self) -> Option<Arc<dyn SessionListener>> {
        locked(&self.listener).clone()
    }

    /// Build the session record for the tab's current id and make it current.
    /// A still-valid id keeps its original start time.
    pub async fn create_session(&self) -> Session {
        let _creating = self.creation.lock().await;
        let (id, minted) = self.resolve_id();
        let expired = self.current().filter(|s| s.id != id);
        self.open_session(id, minted, expired).await
    }

    /// The current session, created if there is none or the old one expired.
    /// Concurrent callers share one creation.
    pub async fn get_session(&self) -> Session {
        let _creating = self.creation.lock().await;
        let (id, minted) = self.resolve_id();
        let expired = match self.current() {
            Some(session) if session.id == id => return session,
            other => other,
        };
        self.open_session(id, minted, expired).await
    }

    async fn open_session(&self, id: String, minted: bool, expired: Option<Session>) -> Session {
        let listener = self.listener();
        let started_at = read_millis(self.storages.tab.as_ref(), StorageKeys::SESSION_START)
            .unwrap_or_else(|| self.clock.now());

        // an in-memory session under another id means the id was renewed
        if minted || expired.is_some() {
            let session = self.build_session(id, started_at).await;
            let expired = expired.map(finalize);
            if let Some(listener) = listener {
                listener.session_started(&session, expired).await;
            }
            return session;
        }

        // same tab, valid id, nothing in memory: a reload
        let rebuilt = self.build_session(id, started_at).await;
        let stored = match listener {
            Some(listener) => listener.session_resumed(&rebuilt).await,
            None => None,
        };
        match stored.filter(|s| s.id == rebuilt.id) {
            Some(stored) => self.adopt(stored),
            None => rebuilt,
        }
    }

    /// Make a persisted record current, keeping its counters and start time
    fn adopt(&self, mut session: Session) -> Session {
        let now = self.clock.now();
        session.last_activity_at = now;
        session.duration = elapsed_millis(session.started_at, now);
        *locked(&self.state) = Some(session.clone());
        debug!(
            "Resumed session {} with {} pageviews",
            session.id, session.pageviews
        );
        session
    }

    async fn build_session(&self, id: String, started_at: UtcDateTime) -> Session {
        let visitor_id = self.visitor_id();
        let fingerprint = self.fingerprint.resolve().await;
        let env = self.env.snapshot();
        let device = self.device.detect(&env);
        // a pending lookup never holds up the session
        let geo = self
            .geo
            .as_ref()
            .and_then(|g| g.cached())
            .unwrap_or_else(|| GeoInfo::unknown(env.timezone.clone()));
        let utm = parse_utm_params(&env.location.search);
        let referrer = classify_referrer(&env.referrer, &env.location.hostname, &utm);
        let bot = is_bot(&env.user_agent);
        let now = self.clock.now();

        let session = Session {
            id,
            visitor_id,
            fingerprint,
            started_at,
            last_activity_at: now,
            duration: elapsed_millis(started_at, now),
            pageviews: 0,
            events: 0,
            device,
            geo,
            referrer,
            utm,
            is_bot: bot,
            is_bounce: true,
            bot_name: if bot { crawler_name(&env.user_agent) } else { None },
        };

        *locked(&self.state) = Some(session.clone());
        self.start_heartbeat();
        debug!(
            "Created session {} for visitor {} ({} referrer)",
            session.id, session.visitor_id, session.referrer.referrer_type
        );
        session
    }

    fn start_heartbeat(&self) {
        let state = self.state.clone();
        let tab = self.storages.tab.clone();
        let clock = self.clock.clone();
        let handle = TaskHandle::spawn_interval(
            "session-heartbeat",
            self.config.heartbeat_interval(),
            move || {
                let state = state.clone();
                let tab = tab.clone();
                let clock = clock.clone();
                async move { touch(&state, tab.as_ref(), clock.now()) }
            },
        );
        // replacing the slot drops and cancels any previous heartbeat
        *locked(&self.heartbeat) = Some(handle);
    }

    pub fn current(&self) -> Option<Session> {
        locked(&self.state).clone()
    }

    pub fn increment_pageviews(&self) {
        let mut guard = locked(&self.state);
        if let Some(session) = guard.as_mut() {
            session.pageviews += 1;
            if session.pageviews > 1 {
                session.is_bounce = false;
            }
        }
    }

    pub fn increment_events(&self) {
        let mut guard = locked(&self.state);
        if let Some(session) = guard.as_mut() {
            session.events += 1;
            if session.events > 0 && session.pageviews >= 1 {
                session.is_bounce = false;
            }
        }
    }

    pub fn update_activity(&self) {
        touch(&self.state, self.storages.tab.as_ref(), self.clock.now());
    }

    /// Replace the geolocation of the active session once a lookup resolves.
    /// Returns false when no session is active.
    pub fn set_geo(&self, geo: GeoInfo) -> bool {
        let mut guard = locked(&self.state);
        match guard.as_mut() {
            Some(session) => {
                session.geo = geo;
                true
            }
            None => false,
        }
    }

    /// Stop the heartbeat and hand back the final state of the session
    pub fn end_session(&self) -> Option<Session> {
        locked(&self.heartbeat).take();
        self.update_activity();
        locked(&self.state).take()
    }

    pub fn has_heartbeat(&self) -> bool {
        locked(&self.heartbeat).is_some()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        locked(&self.heartbeat).take();
    }
}
