//! Tracking lifecycle of one page-render context
//!
//! A [`TrackingContext`] owns every component of a tab: resolvers, session
//! manager, trackers and the store. An [`AnalyticsProvider`] drives it through
//! `Unmounted -> (Gated | Active) -> TornDown` and hands out [`Analytics`]
//! handles to the rest of the page.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use folio_core::{AnalyticsConfig, Clock, SystemClock, TaskHandle};
use folio_entities::{AnalyticsEvent, EventCategory, Pageview, Session, Visitor, WebVital};
use folio_geo::{CachedGeolocation, GeolocationService};
use folio_store::{AnalyticsStore, MemoryDocumentStore, PageviewPatch, SessionPatch};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::bot::is_bot;
use crate::device::DeviceDetector;
use crate::environment::{BrowserEnvironment, SharedEnvironment};
use crate::error::AnalyticsError;
use crate::fingerprint::{FingerprintAgent, FingerprintResolver, HashingAgent};
use crate::locked;
use crate::session::{ClientStorages, SessionListener, SessionManager};
use crate::tracking::{
    subscriber, EventOptions, EventSubscription, EventTracker, FlushHandler, PageviewTracker,
    ScrollDimensions, ScrollTracker, TrackEvent,
};

/// Every component of one tracking context
pub struct TrackingContext {
    config: Arc<AnalyticsConfig>,
    clock: Arc<dyn Clock>,
    env: SharedEnvironment,
    storages: ClientStorages,
    fingerprint: Arc<FingerprintResolver>,
    device: Arc<DeviceDetector>,
    geolocation: Option<Arc<CachedGeolocation>>,
    sessions: Arc<SessionManager>,
    pageviews: Arc<PageviewTracker>,
    events: Arc<EventTracker>,
    scroll: Arc<ScrollTracker>,
    store: Arc<AnalyticsStore>,
}

impl TrackingContext {
    pub fn builder(config: AnalyticsConfig, env: BrowserEnvironment) -> TrackingContextBuilder {
        TrackingContextBuilder {
            config,
            env,
            clock: None,
            storages: None,
            agent: None,
            geolocation: None,
            store: None,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn env(&self) -> &SharedEnvironment {
        &self.env
    }

    pub fn storages(&self) -> &ClientStorages {
        &self.storages
    }

    pub fn fingerprint(&self) -> &Arc<FingerprintResolver> {
        &self.fingerprint
    }

    pub fn device(&self) -> &Arc<DeviceDetector> {
        &self.device
    }

    pub fn geolocation(&self) -> Option<&Arc<CachedGeolocation>> {
        self.geolocation.as_ref()
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn pageviews(&self) -> &Arc<PageviewTracker> {
        &self.pageviews
    }

    pub fn events(&self) -> &Arc<EventTracker> {
        &self.events
    }

    pub fn scroll(&self) -> &Arc<ScrollTracker> {
        &self.scroll
    }

    pub fn store(&self) -> &Arc<AnalyticsStore> {
        &self.store
    }

    /// Client-side navigation to `href`
    pub fn navigate(&self, href: &str) {
        self.env.navigate(href);
    }
}

pub struct TrackingContextBuilder {
    config: AnalyticsConfig,
    env: BrowserEnvironment,
    clock: Option<Arc<dyn Clock>>,
    storages: Option<ClientStorages>,
    agent: Option<Arc<dyn FingerprintAgent>>,
    geolocation: Option<GeolocationService>,
    store: Option<AnalyticsStore>,
}

impl TrackingContextBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn storages(mut self, storages: ClientStorages) -> Self {
        self.storages = Some(storages);
        self
    }

    pub fn fingerprint_agent(mut self, agent: Arc<dyn FingerprintAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Geolocation lookups are only made when a service is given and the
    /// geolocation feature is on
    pub fn geolocation(mut self, service: GeolocationService) -> Self {
        self.geolocation = Some(service);
        self
    }

    pub fn store(mut self, store: AnalyticsStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<TrackingContext, AnalyticsError> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let storages = self.storages.unwrap_or_else(ClientStorages::in_memory);
        let host_timezone = self.env.timezone.clone();
        let env = SharedEnvironment::new(self.env);

        let fingerprint = Arc::new(
            FingerprintResolver::new(
                self.agent.unwrap_or_else(|| Arc::new(HashingAgent)),
                storages.local.clone(),
                env.clone(),
            )
            .with_agent_enabled(config.features.fingerprinting),
        );
        let device = Arc::new(DeviceDetector::new());
        let geolocation = self
            .geolocation
            .filter(|_| config.features.geolocation)
            .map(|service| Arc::new(CachedGeolocation::new(service, host_timezone)));

        let mut sessions = SessionManager::new(
            config.clone(),
            clock.clone(),
            storages.clone(),
            env.clone(),
            fingerprint.clone(),
            device.clone(),
        );
        if let Some(geo) = &geolocation {
            sessions = sessions.with_geolocation(geo.clone());
        }
        let sessions = Arc::new(sessions);

        let pageviews = Arc::new(PageviewTracker::new(
            config.clone(),
            clock.clone(),
            env.clone(),
            sessions.clone(),
            device.clone(),
        ));
        let events = Arc::new(EventTracker::new(
            config.clone(),
            clock.clone(),
            env.clone(),
            sessions.clone(),
            pageviews.clone(),
        ));
        let scroll = Arc::new(ScrollTracker::new(
            config.clone(),
            env.clone(),
            pageviews.clone(),
            events.clone(),
        ));
        let store = Arc::new(self.store.unwrap_or_else(|| {
            AnalyticsStore::with_clock(
                Arc::new(MemoryDocumentStore::with_clock(clock.clone())),
                clock.clone(),
            )
            .with_batch_size(config.batch_size)
        }));

        Ok(TrackingContext {
            config,
            clock,
            env,
            storages,
            fingerprint,
            device,
            geolocation,
            sessions,
            pageviews,
            events,
            scroll,
            store,
        })
    }
}

/// Why a mounted provider is not tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Disabled,
    ExcludedPath,
    Bot,
    ExcludedIp,
    Sampled,
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            GateReason::Disabled => "tracking disabled",
            GateReason::ExcludedPath => "path excluded",
            GateReason::Bot => "bot detected",
            GateReason::ExcludedIp => "ip excluded",
            GateReason::Sampled => "sampled out",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Unmounted,
    Gated(GateReason),
    Active,
    TornDown,
}

/// Writes flushed event batches to the store
struct StoreFlushHandler {
    store: Arc<AnalyticsStore>,
}

#[async_trait]
impl FlushHandler for StoreFlushHandler {
    async fn flush(&self, events: Vec<AnalyticsEvent>) {
        self.store.save_events_batch(&events).await;
    }
}

/// Persists sessions as they open. A new session is saved and counted on its
/// visitor; a resumed one continues from its stored document.
struct StoreSessionListener {
    store: Arc<AnalyticsStore>,
}

#[async_trait]
impl SessionListener for StoreSessionListener {
    async fn session_started(&self, session: &Session, expired: Option<Session>) {
        if let Some(expired) = expired {
            self.store
                .update_session(&expired.id, &SessionPatch::activity(&expired))
                .await;
            debug!("Session {} timed out after {} ms", expired.id, expired.duration);
        }
        self.store.save_session(session).await;
        self.store.save_visitor(&Visitor::first_seen(session)).await;
    }

    async fn session_resumed(&self, rebuilt: &Session) -> Option<Session> {
        let stored = self.store.get_session(&rebuilt.id).await;
        if stored.is_none() {
            // never persisted, e.g. the store was down when it started
            self.store.save_session(rebuilt).await;
        }
        stored
    }
}

/// Resources held while active; dropping the task handles cancels them
#[derive(Default)]
struct Mounted {
    subscriptions: Vec<EventSubscription>,
    tasks: Vec<TaskHandle>,
}

pub struct AnalyticsProvider {
    context: Arc<TrackingContext>,
    state: Mutex<ProviderState>,
    active: Arc<AtomicBool>,
    lifecycle: tokio::sync::Mutex<Option<Mounted>>,
}

impl AnalyticsProvider {
    pub fn new(context: TrackingContext) -> Self {
        Self {
            context: Arc::new(context),
            state: Mutex::new(ProviderState::Unmounted),
            active: Arc::new(AtomicBool::new(false)),
            lifecycle: tokio::sync::Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<TrackingContext> {
        &self.context
    }

    pub fn state(&self) -> ProviderState {
        *locked(&self.state)
    }

    fn set_state(&self, state: ProviderState) {
        *locked(&self.state) = state;
    }

    fn gate(&self) -> Option<GateReason> {
        let config = &self.context.config;
        let env = self.context.env.snapshot();

        if !config.enabled {
            return Some(GateReason::Disabled);
        }
        if config.is_path_excluded(&env.location.pathname) {
            return Some(GateReason::ExcludedPath);
        }
        if !config.track_bots && is_bot(&env.user_agent) {
            return Some(GateReason::Bot);
        }
        if env.ip.as_deref().is_some_and(|ip| config.is_ip_excluded(ip)) {
            return Some(GateReason::ExcludedIp);
        }
        if config.sample_rate < 1.0 && rand::thread_rng().gen::<f64>() >= config.sample_rate {
            return Some(GateReason::Sampled);
        }
        None
    }

    /// Start tracking: apply the gates, resolve identity, persist the session
    /// and visitor, and start the background tasks.
    pub async fn mount(&self) -> Result<ProviderState, AnalyticsError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match self.state() {
            ProviderState::Unmounted => {}
            ProviderState::TornDown => return Err(AnalyticsError::TornDown),
            ProviderState::Gated(_) | ProviderState::Active => {
                return Err(AnalyticsError::AlreadyMounted)
            }
        }

        if let Some(reason) = self.gate() {
            let state = ProviderState::Gated(reason);
            self.set_state(state);
            if reason == GateReason::Bot {
                info!("Bot detected, tracking disabled");
            } else if self.context.config.debug {
                debug!("Tracking gated: {}", reason);
            }
            return Ok(state);
        }

        let ctx = &self.context;
        let new_visitor = ctx.sessions.is_new_visitor();
        let env = ctx.env.snapshot();
        ctx.sessions.set_listener(Arc::new(StoreSessionListener {
            store: ctx.store.clone(),
        }));
        let session = ctx.sessions.get_session().await;

        let mut mounted = Mounted::default();
        if let Some(task) = self.spawn_geolocation() {
            mounted.tasks.push(task);
        }

        ctx.scroll
            .start(ScrollDimensions::from_environment(&env), env.scroll_top)
            .await;

        let store = ctx.store.clone();
        mounted.subscriptions.push(ctx.events.on_event(subscriber(move |event| {
            let store = store.clone();
            async move {
                store.try_save_event(&event).await?;
                Ok::<(), anyhow::Error>(())
            }
        })));
        if ctx.config.debug {
            mounted.subscriptions.push(ctx.events.on_event(subscriber(|event| async move {
                debug!(
                    "Event {} [{}] label={:?} value={:?}",
                    event.name, event.category, event.label, event.value
                );
                Ok::<(), anyhow::Error>(())
            })));
        }

        ctx.events.set_flush_handler(Arc::new(StoreFlushHandler {
            store: ctx.store.clone(),
        }));
        let events = ctx.events.clone();
        let store = ctx.store.clone();
        mounted.tasks.push(TaskHandle::spawn_interval(
            "event-flush-interval",
            ctx.config.flush_interval(),
            move || {
                let events = events.clone();
                let store = store.clone();
                async move {
                    let batch = events.flush_event_queue();
                    if !batch.is_empty() {
                        store.save_events_batch(&batch).await;
                    }
                }
            },
        ));

        *lifecycle = Some(mounted);
        self.active.store(true, Ordering::SeqCst);
        self.set_state(ProviderState::Active);

        if ctx.config.debug {
            debug!(
                "Analytics initialized: session={} visitor={} ({}) fingerprint={}...",
                session.id,
                session.visitor_id,
                if new_visitor { "new" } else { "returning" },
                session.fingerprint.chars().take(8).collect::<String>()
            );
        }
        Ok(ProviderState::Active)
    }

    /// Look up the location in the background and attach it to the session
    fn spawn_geolocation(&self) -> Option<TaskHandle> {
        let geo = self.context.geolocation.clone()?;
        let sessions = self.context.sessions.clone();
        let store = self.context.store.clone();

        Some(TaskHandle::spawn_after("geolocation", Duration::ZERO, async move {
            let info = geo.resolve().await;
            if info.is_unknown() {
                return;
            }
            if sessions.set_geo(info.clone()) {
                if let Some(session) = sessions.current() {
                    store.update_session(&session.id, &SessionPatch::geo(info)).await;
                }
            }
        }))
    }

    /// Handle to the tracking API. Gated providers hand out a handle whose
    /// methods do nothing.
    pub fn analytics(&self) -> Result<Analytics, AnalyticsError> {
        match self.state() {
            ProviderState::Unmounted => Err(AnalyticsError::NotMounted),
            ProviderState::TornDown => Err(AnalyticsError::TornDown),
            ProviderState::Gated(_) | ProviderState::Active => Ok(Analytics {
                context: self.context.clone(),
                active: self.active.clone(),
            }),
        }
    }

    /// Navigation away: stop everything and persist the final pageview and
    /// session. Runs once; later calls do nothing.
    pub async fn unmount(&self) -> Result<(), AnalyticsError> {
        self.teardown("unmount").await
    }

    /// Page close. Same teardown as [`unmount`](Self::unmount); whichever
    /// comes first does the work.
    pub async fn unload(&self) -> Result<(), AnalyticsError> {
        self.teardown("unload").await
    }

    async fn teardown(&self, trigger: &str) -> Result<(), AnalyticsError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match self.state() {
            ProviderState::Unmounted => return Err(AnalyticsError::NotMounted),
            ProviderState::TornDown => return Ok(()),
            ProviderState::Gated(_) => {
                self.set_state(ProviderState::TornDown);
                return Ok(());
            }
            ProviderState::Active => {}
        }

        self.active.store(false, Ordering::SeqCst);
        self.set_state(ProviderState::TornDown);
        let ctx = &self.context;

        if let Some(mounted) = lifecycle.take() {
            for subscription in mounted.subscriptions {
                subscription.unsubscribe();
            }
            for task in mounted.tasks {
                task.cancel();
            }
        }
        ctx.events.clear_flush_handler();
        ctx.sessions.clear_listener();
        ctx.scroll.stop();

        let queued = ctx.events.flush_event_queue();
        if !queued.is_empty() {
            ctx.store.save_events_batch(&queued).await;
        }

        if let Some(pageview) = ctx.pageviews.end_pageview() {
            ctx.store
                .update_pageview(&pageview.id, &PageviewPatch::finished(&pageview))
                .await;
        }

        match ctx.sessions.end_session() {
            Some(session) => {
                ctx.store
                    .update_session(&session.id, &SessionPatch::activity(&session))
                    .await;
                debug!("Session {} ended on {} after {} ms", session.id, trigger, session.duration);
            }
            None => warn!("No active session to end on {}", trigger),
        }
        Ok(())
    }
}

/// The tracking API handed to the page
#[derive(Clone)]
pub struct Analytics {
    context: Arc<TrackingContext>,
    active: Arc<AtomicBool>,
}

impl Analytics {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> &TrackingContext {
        &self.context
    }

    /// Start a pageview and persist it, along with the final state of the
    /// pageview it replaces
    pub async fn track_pageview(&self, path: Option<&str>, title: Option<&str>) -> Option<Pageview> {
        if !self.is_active() {
            return None;
        }
        let ctx = &self.context;

        let change = ctx.pageviews.track_pageview(path, title).await?;
        // thresholds of the page still shown stay fired when the path is excluded
        let dimensions = ScrollDimensions::from_environment(&ctx.env.snapshot());
        ctx.scroll.reset(Some(dimensions));

        if let Some(previous) = &change.previous {
            ctx.store
                .update_pageview(&previous.id, &PageviewPatch::finished(previous))
                .await;
        }
        ctx.store.save_pageview(&change.current).await;
        Some(change.current)
    }

    /// Scroll position changed
    pub async fn scroll(&self, scroll_top: f64) {
        if !self.is_active() {
            return;
        }
        self.context.env.update(|env| env.scroll_top = scroll_top);
        self.context.scroll.on_scroll(scroll_top).await;
    }

    /// Viewport or document size changed
    pub fn resize(&self, viewport_width: u32, viewport_height: u32, document_height: f64) {
        if !self.is_active() {
            return;
        }
        let ctx = &self.context;
        ctx.env.update(|env| {
            env.viewport_width = viewport_width;
            env.viewport_height = viewport_height;
            env.document_height = document_height;
        });
        ctx.device.update_viewport(viewport_width, viewport_height);
        ctx.scroll
            .on_resize(ScrollDimensions::new(document_height, viewport_height as f64));
    }

    /// Force a scroll sample after content loaded
    pub async fn check_scroll_depth(&self) {
        if !self.is_active() {
            return;
        }
        let env = self.context.env.snapshot();
        self.context
            .scroll
            .check(ScrollDimensions::from_environment(&env), env.scroll_top)
            .await;
    }

    pub fn update_performance_metric(&self, vital: WebVital, value: f64) {
        if self.is_active() {
            self.context.pageviews.update_performance_metric(vital, value);
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.context.sessions.current()
    }

    pub fn current_pageview(&self) -> Option<Pageview> {
        self.context.pageviews.current()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session().map(|s| s.id)
    }

    pub fn visitor_id(&self) -> Option<String> {
        self.session().map(|s| s.visitor_id)
    }
}

#[async_trait]
impl TrackEvent for Analytics {
    async fn track_event(
        &self,
        name: &str,
        category: EventCategory,
        options: EventOptions,
    ) -> Option<AnalyticsEvent> {
        if !self.is_active() {
            return None;
        }
        self.context.events.track_event(name, category, options).await
    }
}
