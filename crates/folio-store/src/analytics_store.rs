//! Analytics persistence over a [`DocumentStore`]
//!
//! Every public operation is best-effort: failures are logged and swallowed,
//! reads fall back to empty results. The `try_*` variants surface the error
//! for callers that want it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use folio_core::{Clock, SystemClock, UtcDateTime};
use folio_entities::{AnalyticsEvent, DailyStats, DashboardMetrics, Pageview, Session, Visitor};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::codec::{decode, encode, sanitize_properties, MAX_NESTING_DEPTH};
use crate::dashboard::{compute_dashboard, PeriodRecords};
use crate::document::{DocValue, Document, Fields};
use crate::error::Result;
use crate::patch::{PageviewPatch, SessionPatch};
use crate::schema::{self, CollectionSchema, CREATED_AT, UPDATED_AT};
use crate::traits::{Direction, DocumentStore, FieldValue, FilterOp, Query, Write, WriteFields};

pub const DEFAULT_RECENT_SESSIONS: usize = 50;
pub const DEFAULT_RECENT_EVENTS: usize = 100;

/// UTC calendar day key of the daily aggregate document
pub fn daily_key(at: UtcDateTime) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn literal_fields(fields: Fields) -> WriteFields {
    fields
        .into_iter()
        .map(|(key, value)| (key, FieldValue::Value(value)))
        .collect()
}

fn decode_all<T: DeserializeOwned>(schema: &CollectionSchema, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode(&doc.fields) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("Skipping malformed {} document {}: {}", schema.name, doc.id, e);
                None
            }
        })
        .collect()
}

pub struct AnalyticsStore {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl AnalyticsStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            batch_size: folio_core::DEFAULT_BATCH_SIZE,
        }
    }

    /// Maximum number of events written per batch commit
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ---------- Sessions ----------

    pub async fn save_session(&self, session: &Session) {
        match self.try_save_session(session).await {
            Ok(()) => debug!("Session saved: {}", session.id),
            Err(e) => error!("Failed to save session {}: {}", session.id, e),
        }
    }

    pub async fn try_save_session(&self, session: &Session) -> Result<()> {
        let mut fields = literal_fields(encode(session, &schema::SESSIONS)?);
        fields.insert(CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        fields.insert(UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
        self.store
            .commit(vec![Write::Set {
                collection: schema::SESSIONS.name.to_string(),
                id: session.id.clone(),
                fields,
            }])
            .await
    }

    pub async fn update_session(&self, session_id: &str, patch: &SessionPatch) {
        if let Err(e) = self.try_update_session(session_id, patch).await {
            error!("Failed to update session {}: {}", session_id, e);
        }
    }

    pub async fn try_update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        let mut fields = literal_fields(encode(patch, &schema::SESSIONS)?);
        fields.insert(UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
        self.store
            .commit(vec![Write::Update {
                collection: schema::SESSIONS.name.to_string(),
                id: session_id.to_string(),
                fields,
            }])
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.get_entity(&schema::SESSIONS, session_id).await
    }

    // ---------- Visitors ----------

    /// Create the visitor if unknown; otherwise only bump `lastSeenAt` and
    /// `totalSessions` so aggregates accumulated elsewhere are not clobbered.
    pub async fn save_visitor(&self, visitor: &Visitor) {
        if let Err(e) = self.try_save_visitor(visitor).await {
            error!("Failed to save visitor {}: {}", visitor.id, e);
        }
    }

    pub async fn try_save_visitor(&self, visitor: &Visitor) -> Result<()> {
        let collection = schema::VISITORS.name.to_string();
        let existing = self.store.get(&collection, &visitor.id).await?;

        let write = if existing.is_some() {
            let mut fields = WriteFields::new();
            fields.insert("lastSeenAt".to_string(), FieldValue::ServerTimestamp);
            fields.insert("totalSessions".to_string(), FieldValue::Increment(1));
            fields.insert(UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
            Write::Update {
                collection,
                id: visitor.id.clone(),
                fields,
            }
        } else {
            let mut fields = literal_fields(encode(visitor, &schema::VISITORS)?);
            fields.insert(CREATED_AT.to_string(), FieldValue::ServerTimestamp);
            fields.insert(UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
            Write::Set {
                collection,
                id: visitor.id.clone(),
                fields,
            }
        };

        self.store.commit(vec![write]).await?;
        debug!(
            "Visitor {} {}",
            visitor.id,
            if existing.is_some() { "updated" } else { "created" }
        );
        Ok(())
    }

    pub async fn get_visitor(&self, visitor_id: &str) -> Option<Visitor> {
        self.get_entity(&schema::VISITORS, visitor_id).await
    }

    // ---------- Pageviews ----------

    pub async fn save_pageview(&self, pageview: &Pageview) {
        match self.try_save_pageview(pageview).await {
            Ok(()) => {
                debug!("Pageview saved: {}", pageview.id);
                self.increment_daily_stat(DailyStats::PAGEVIEWS, 1).await;
            }
            Err(e) => error!("Failed to save pageview {}: {}", pageview.id, e),
        }
    }

    pub async fn try_save_pageview(&self, pageview: &Pageview) -> Result<()> {
        let mut fields = literal_fields(encode(pageview, &schema::PAGEVIEWS)?);
        fields.insert(CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        self.store
            .commit(vec![Write::Set {
                collection: schema::PAGEVIEWS.name.to_string(),
                id: pageview.id.clone(),
                fields,
            }])
            .await
    }

    pub async fn update_pageview(&self, pageview_id: &str, patch: &PageviewPatch) {
        if let Err(e) = self.try_update_pageview(pageview_id, patch).await {
            error!("Failed to update pageview {}: {}", pageview_id, e);
        }
    }

    pub async fn try_update_pageview(&self, pageview_id: &str, patch: &PageviewPatch) -> Result<()> {
        let fields = literal_fields(encode(patch, &schema::PAGEVIEWS)?);
        self.store
            .commit(vec![Write::Update {
                collection: schema::PAGEVIEWS.name.to_string(),
                id: pageview_id.to_string(),
                fields,
            }])
            .await
    }

    // ---------- Events ----------

    /// Persist one event and bump the daily `events` and `event_<name>` counters
    pub async fn save_event(&self, event: &AnalyticsEvent) {
        match self.try_save_event(event).await {
            Ok(()) => debug!("Event saved: {}", event.name),
            Err(e) => error!("Failed to save event {}: {}", event.name, e),
        }
    }

    pub async fn try_save_event(&self, event: &AnalyticsEvent) -> Result<()> {
        self.store
            .commit(vec![self.event_write(event)?])
            .await?;
        self.try_increment_daily_stats(&[
            (DailyStats::EVENTS.to_string(), 1),
            (DailyStats::event_metric(&event.name), 1),
        ])
        .await
    }

    /// Write event documents in chunks of the configured batch size.
    ///
    /// Only the documents are written: daily counters are owned by
    /// [`save_event`](Self::save_event). Writes are keyed by event id, so
    /// re-sending a batch does not duplicate anything. Returns the number of
    /// events persisted.
    pub async fn save_events_batch(&self, events: &[AnalyticsEvent]) -> usize {
        let mut saved = 0;
        for chunk in events.chunks(self.batch_size) {
            match self.try_save_events_chunk(chunk).await {
                Ok(()) => saved += chunk.len(),
                Err(e) => error!("Failed to save batch of {} events: {}", chunk.len(), e),
            }
        }
        if saved > 0 {
            debug!("Batch saved: {} events", saved);
        }
        saved
    }

    async fn try_save_events_chunk(&self, chunk: &[AnalyticsEvent]) -> Result<()> {
        let writes = chunk
            .iter()
            .map(|event| self.event_write(event))
            .collect::<Result<Vec<_>>>()?;
        self.store.commit(writes).await
    }

    fn event_write(&self, event: &AnalyticsEvent) -> Result<Write> {
        let mut event = event.clone();
        // The bag itself sits one level below the document root
        event.properties = event
            .properties
            .take()
            .map(|props| sanitize_properties(props, MAX_NESTING_DEPTH - 1));

        let mut fields = literal_fields(encode(&event, &schema::EVENTS)?);
        fields.insert(CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        Ok(Write::Set {
            collection: schema::EVENTS.name.to_string(),
            id: event.id,
            fields,
        })
    }

    // ---------- Daily stats ----------

    pub async fn increment_daily_stat(&self, metric: &str, by: i64) {
        if let Err(e) = self.try_increment_daily_stats(&[(metric.to_string(), by)]).await {
            error!("Failed to update daily stat {}: {}", metric, e);
        }
    }

    /// Merge additive increments into today's aggregate document
    pub async fn try_increment_daily_stats(&self, increments: &[(String, i64)]) -> Result<()> {
        let key = daily_key(self.clock.now());
        let mut fields = WriteFields::new();
        fields.insert("date".to_string(), FieldValue::Value(DocValue::String(key.clone())));
        for (metric, by) in increments {
            fields.insert(metric.clone(), FieldValue::Increment(*by));
        }
        fields.insert(UPDATED_AT.to_string(), FieldValue::ServerTimestamp);

        self.store
            .commit(vec![Write::Merge {
                collection: schema::DAILY_STATS.name.to_string(),
                id: key,
                fields,
            }])
            .await
    }

    /// Daily aggregates for `start..=end`, both `YYYY-MM-DD`, keyed by date
    pub async fn get_daily_stats(&self, start: &str, end: &str) -> BTreeMap<String, DailyStats> {
        let query = Query::new()
            .filter("date", FilterOp::Gte, start)
            .filter("date", FilterOp::Lte, end)
            .order_by("date", Direction::Ascending);

        match self.store.query(schema::DAILY_STATS.name, query).await {
            Ok(docs) => docs
                .into_iter()
                .filter_map(|doc| {
                    let stats = daily_stats_from(&doc)?;
                    Some((stats.date.clone(), stats))
                })
                .collect(),
            Err(e) => {
                error!("Failed to get daily stats: {}", e);
                BTreeMap::new()
            }
        }
    }

    // ---------- Queries ----------

    pub async fn get_recent_sessions(&self, limit: usize) -> Vec<Session> {
        let query = Query::new()
            .order_by("startedAt", Direction::Descending)
            .limit(limit);
        self.query_entities(&schema::SESSIONS, query, "recent sessions")
            .await
    }

    pub async fn get_recent_events(&self, limit: usize, name: Option<&str>) -> Vec<AnalyticsEvent> {
        let mut query = Query::new()
            .order_by("timestamp", Direction::Descending)
            .limit(limit);
        if let Some(name) = name {
            query = query.filter("name", FilterOp::Eq, name);
        }
        self.query_entities(&schema::EVENTS, query, "recent events")
            .await
    }

    pub async fn get_pageviews_by_path(&self, path: &str, limit: usize) -> Vec<Pageview> {
        let query = Query::new()
            .filter("path", FilterOp::Eq, path)
            .order_by("timestamp", Direction::Descending)
            .limit(limit);
        self.query_entities(&schema::PAGEVIEWS, query, "pageviews by path")
            .await
    }

    /// Dashboard aggregates for `start..=end`, with trends against the
    /// preceding period of the same length. `None` if the store failed.
    pub async fn get_dashboard_metrics(
        &self,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Option<DashboardMetrics> {
        match self.try_get_dashboard_metrics(start, end).await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                error!("Failed to get dashboard metrics: {}", e);
                None
            }
        }
    }

    pub async fn try_get_dashboard_metrics(
        &self,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Result<DashboardMetrics> {
        let length = (end - start).max(Duration::zero());
        let previous_start = start - length;
        let previous_end = start - Duration::milliseconds(1);

        let current = self.fetch_period(start, end).await?;
        let previous = if length > Duration::zero() {
            self.fetch_period(previous_start, previous_end).await?
        } else {
            PeriodRecords::default()
        };

        Ok(compute_dashboard(start, end, &current, &previous))
    }

    async fn fetch_period(&self, start: UtcDateTime, end: UtcDateTime) -> Result<PeriodRecords> {
        let in_range = |field: &str| {
            Query::new()
                .filter(field, FilterOp::Gte, start)
                .filter(field, FilterOp::Lte, end)
        };

        let sessions = self
            .store
            .query(schema::SESSIONS.name, in_range("startedAt"))
            .await?;
        let pageviews = self
            .store
            .query(schema::PAGEVIEWS.name, in_range("timestamp"))
            .await?;
        let events = self
            .store
            .query(schema::EVENTS.name, in_range("timestamp"))
            .await?;

        Ok(PeriodRecords {
            sessions: decode_all(&schema::SESSIONS, sessions),
            pageviews: decode_all(&schema::PAGEVIEWS, pageviews),
            events: decode_all(&schema::EVENTS, events),
        })
    }

    async fn get_entity<T: DeserializeOwned>(&self, schema: &CollectionSchema, id: &str) -> Option<T> {
        match self.store.get(schema.name, id).await {
            Ok(Some(doc)) => match decode(&doc.fields) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!("Malformed {} document {}: {}", schema.name, id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Failed to get {} {}: {}", schema.name, id, e);
                None
            }
        }
    }

    async fn query_entities<T: DeserializeOwned>(
        &self,
        schema: &CollectionSchema,
        query: Query,
        what: &str,
    ) -> Vec<T> {
        match self.store.query(schema.name, query).await {
            Ok(docs) => decode_all(schema, docs),
            Err(e) => {
                error!("Failed to get {}: {}", what, e);
                Vec::new()
            }
        }
    }
}

fn daily_stats_from(doc: &Document) -> Option<DailyStats> {
    let date = doc.get("date")?.as_str()?.to_string();
    let metrics = doc
        .fields
        .iter()
        .filter(|(key, _)| key.as_str() != "date")
        .filter_map(|(key, value)| value.as_i64().map(|v| (key.clone(), v)))
        .collect();

    Some(DailyStats {
        date,
        metrics,
        updated_at: doc.get(UPDATED_AT).and_then(DocValue::as_timestamp),
    })
}
