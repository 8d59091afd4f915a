//! Fan-out of tracked events to subscribers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use folio_entities::AnalyticsEvent;
use futures::future::BoxFuture;
use tracing::error;

use crate::locked;

pub type EventSubscriber =
    Arc<dyn Fn(AnalyticsEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as an [`EventSubscriber`]
pub fn subscriber<F, Fut>(f: F) -> EventSubscriber
where
    F: Fn(AnalyticsEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

type Subscribers = Mutex<Vec<(u64, EventSubscriber)>>;

#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Arc<Subscribers>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: EventSubscriber) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        locked(&self.subscribers).push((id, subscriber));
        EventSubscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn clear(&self) {
        locked(&self.subscribers).clear();
    }

    pub fn len(&self) -> usize {
        locked(&self.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every subscriber concurrently and wait for all of
    /// them. Failures and panics are logged; they never reach the caller.
    pub async fn dispatch(&self, event: &AnalyticsEvent) {
        let targets: Vec<EventSubscriber> = locked(&self.subscribers)
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        if targets.is_empty() {
            return;
        }

        let tasks: Vec<_> = targets
            .into_iter()
            .map(|subscriber| tokio::spawn(subscriber(event.clone())))
            .collect();

        for result in futures::future::join_all(tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Event subscriber failed for {}: {}", event.name, e),
                Err(e) => error!("Event subscriber panicked for {}: {}", event.name, e),
            }
        }
    }
}

/// Registration handle returned by [`EventDispatcher::subscribe`]
#[derive(Debug)]
pub struct EventSubscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl EventSubscription {
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            locked(&subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}
