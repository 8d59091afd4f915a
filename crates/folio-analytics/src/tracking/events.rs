//! Custom event tracking with a batched flush queue

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::{generate_id, AnalyticsConfig, Clock, TaskHandle};
use folio_entities::{AnalyticsEvent, EventCategory};
use serde_json::{Map, Value};
use tracing::debug;

use super::catalog::TrackEvent;
use super::dispatcher::{EventDispatcher, EventSubscriber, EventSubscription};
use super::pageview::PageviewTracker;
use crate::environment::SharedEnvironment;
use crate::locked;
use crate::session::SessionManager;

/// Optional attributes of a tracked event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    pub label: Option<String>,
    pub value: Option<f64>,
    pub properties: Option<Map<String, Value>>,
    /// Defaults to the active pageview
    pub pageview_id: Option<String>,
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn pageview_id(mut self, id: impl Into<String>) -> Self {
        self.pageview_id = Some(id.into());
        self
    }
}

/// Receives the queued events when the flush timer fires
#[async_trait]
pub trait FlushHandler: Send + Sync {
    async fn flush(&self, events: Vec<AnalyticsEvent>);
}

type Queue = Arc<Mutex<Vec<AnalyticsEvent>>>;
type HandlerSlot = Arc<Mutex<Option<Arc<dyn FlushHandler>>>>;

pub struct EventTracker {
    config: Arc<AnalyticsConfig>,
    clock: Arc<dyn Clock>,
    env: SharedEnvironment,
    sessions: Arc<SessionManager>,
    pageviews: Arc<PageviewTracker>,
    queue: Queue,
    flush_timer: Arc<Mutex<Option<TaskHandle>>>,
    flush_handler: HandlerSlot,
    dispatcher: EventDispatcher,
}

impl EventTracker {
    pub fn new(
        config: Arc<AnalyticsConfig>,
        clock: Arc<dyn Clock>,
        env: SharedEnvironment,
        sessions: Arc<SessionManager>,
        pageviews: Arc<PageviewTracker>,
    ) -> Self {
        Self {
            config,
            clock,
            env,
            sessions,
            pageviews,
            queue: Arc::new(Mutex::new(Vec::new())),
            flush_timer: Arc::new(Mutex::new(None)),
            flush_handler: Arc::new(Mutex::new(None)),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Record an event against the current session, queue it and notify
    /// subscribers. Returns `None` when tracking is disabled.
    pub async fn track_event(
        &self,
        name: &str,
        category: EventCategory,
        options: EventOptions,
    ) -> Option<AnalyticsEvent> {
        if !self.config.enabled {
            return None;
        }

        let session = self.sessions.get_session().await;
        let now = self.clock.now();
        let event = AnalyticsEvent {
            id: generate_id("e", now),
            session_id: session.id,
            visitor_id: session.visitor_id,
            pageview_id: options.pageview_id.or_else(|| self.pageviews.current_id()),
            category,
            name: name.to_string(),
            label: options.label,
            value: options.value,
            properties: options.properties,
            timestamp: now,
            path: self.env.pathname(),
        };

        self.sessions.increment_events();
        self.sessions.update_activity();
        locked(&self.queue).push(event.clone());

        self.dispatcher.dispatch(&event).await;
        self.schedule_flush();

        if self.config.debug {
            debug!("Event tracked: {} ({}) on {}", event.name, event.category, event.path);
        }
        Some(event)
    }

    /// Arm the flush timer unless one is already pending
    pub fn schedule_flush(&self) {
        let mut slot = locked(&self.flush_timer);
        if slot.is_some() {
            return;
        }

        let queue = self.queue.clone();
        let timer = self.flush_timer.clone();
        let handler = self.flush_handler.clone();
        *slot = Some(TaskHandle::spawn_after(
            "event-flush",
            self.config.flush_interval(),
            async move {
                // free the slot so the next event can arm a new timer
                let _fired = locked(&timer).take();
                let handler = locked(&handler).clone();
                let Some(handler) = handler else {
                    return;
                };
                let events = std::mem::take(&mut *locked(&queue));
                if !events.is_empty() {
                    handler.flush(events).await;
                }
            },
        ));
    }

    /// Drain the queue and cancel any pending flush timer
    pub fn flush_event_queue(&self) -> Vec<AnalyticsEvent> {
        let events = std::mem::take(&mut *locked(&self.queue));
        locked(&self.flush_timer).take();
        events
    }

    pub fn event_queue(&self) -> Vec<AnalyticsEvent> {
        locked(&self.queue).clone()
    }

    pub fn has_pending_flush(&self) -> bool {
        locked(&self.flush_timer).is_some()
    }

    pub fn set_flush_handler(&self, handler: Arc<dyn FlushHandler>) {
        *locked(&self.flush_handler) = Some(handler);
    }

    pub fn clear_flush_handler(&self) {
        locked(&self.flush_handler).take();
    }

    pub fn on_event(&self, subscriber: EventSubscriber) -> EventSubscription {
        self.dispatcher.subscribe(subscriber)
    }

    pub fn clear_subscribers(&self) {
        self.dispatcher.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.len()
    }
}

#[async_trait]
impl TrackEvent for EventTracker {
    async fn track_event(
        &self,
        name: &str,
        category: EventCategory,
        options: EventOptions,
    ) -> Option<AnalyticsEvent> {
        EventTracker::track_event(self, name, category, options).await
    }
}
