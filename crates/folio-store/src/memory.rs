use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::{Clock, SystemClock, UtcDateTime};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::document::{field_at, DocValue, Document, Fields};
use crate::error::{Result, StoreError};
use crate::traits::{Direction, DocumentStore, FieldValue, Filter, FilterOp, Query, Write, WriteFields};

/// All collections of a store, keyed by collection then document id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSet {
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of writes in order. On error `self` may be partially
    /// modified; callers apply batches to a copy to get atomicity.
    pub fn apply(&mut self, writes: Vec<Write>, now: UtcDateTime) -> Result<()> {
        for write in writes {
            match write {
                Write::Set {
                    collection,
                    id,
                    fields,
                } => {
                    let mut doc = Fields::new();
                    patch(&mut doc, fields, now);
                    self.collections.entry(collection).or_default().insert(id, doc);
                }
                Write::Update {
                    collection,
                    id,
                    fields,
                } => {
                    let doc = self
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                        .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))?;
                    patch(doc, fields, now);
                }
                Write::Merge {
                    collection,
                    id,
                    fields,
                } => {
                    let doc = self
                        .collections
                        .entry(collection)
                        .or_default()
                        .entry(id)
                        .or_default();
                    patch(doc, fields, now);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
    }

    pub fn query(&self, collection: &str, query: &Query) -> Vec<Document> {
        let Some(docs) = self.collections.get(collection) else {
            return Vec::new();
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| query.filters.iter().all(|f| matches_filter(fields, f)))
            .filter(|(_, fields)| match &query.order_by {
                Some((field, _)) => field_at(fields, field).is_some(),
                None => true,
            })
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(|docs| docs.is_empty())
    }
}

fn patch(doc: &mut Fields, fields: WriteFields, now: UtcDateTime) {
    for (key, value) in fields {
        let resolved = match value {
            FieldValue::Value(v) => v,
            FieldValue::ServerTimestamp => DocValue::Timestamp(now),
            FieldValue::Increment(by) => match doc.get(&key) {
                Some(DocValue::Integer(current)) => DocValue::Integer(current.saturating_add(by)),
                Some(DocValue::Double(current)) => DocValue::Double(current + by as f64),
                _ => DocValue::Integer(by),
            },
        };
        doc.insert(key, resolved);
    }
}

fn matches_filter(fields: &Fields, filter: &Filter) -> bool {
    let Some(value) = field_at(fields, &filter.field) else {
        return false;
    };
    let Some(ordering) = value.compare(&filter.value) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
    }
}

/// In-process document store, used by tests and as the default backend
pub struct MemoryDocumentStore {
    state: Mutex<DocumentSet>,
    clock: Arc<dyn Clock>,
    failing: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(DocumentSet::new()),
            clock,
            failing: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent operation fail as if the store were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Number of successfully committed batches
    pub fn commit_count(&self) -> usize {
        self.commits.load(AtomicOrdering::SeqCst)
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.state.lock().map(|s| s.len(collection)).unwrap_or(0)
    }

    pub fn snapshot(&self) -> DocumentSet {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::unavailable("memory store is in failure mode"));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DocumentSet>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        self.check_available()?;
        let now = self.clock.now();
        let mut state = self.lock()?;
        let mut next = state.clone();
        trace!("Committing {} writes", writes.len());
        next.apply(writes, now)?;
        *state = next;
        self.commits.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check_available()?;
        Ok(self.lock()?.get(collection, id))
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>> {
        self.check_available()?;
        Ok(self.lock()?.query(collection, &query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use folio_core::ManualClock;

    fn fields(pairs: &[(&str, FieldValue)]) -> WriteFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_update_missing_document_fails_atomically() {
        let store = MemoryDocumentStore::new();
        let result = store
            .commit(vec![
                Write::Set {
                    collection: "c".to_string(),
                    id: "a".to_string(),
                    fields: fields(&[("n", FieldValue::Value(DocValue::Integer(1)))]),
                },
                Write::Update {
                    collection: "c".to_string(),
                    id: "missing".to_string(),
                    fields: fields(&[("n", FieldValue::Increment(1))]),
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        // the Set in the same batch must not have been applied
        assert_eq!(store.count("c"), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_merge_increments_and_server_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
        let store = MemoryDocumentStore::with_clock(Arc::new(ManualClock::new(now)));

        for _ in 0..3 {
            store
                .commit(vec![Write::Merge {
                    collection: "daily".to_string(),
                    id: "2024-04-02".to_string(),
                    fields: fields(&[
                        ("pageviews", FieldValue::Increment(2)),
                        ("updatedAt", FieldValue::ServerTimestamp),
                    ]),
                }])
                .await
                .unwrap();
        }

        let doc = store.get("daily", "2024-04-02").await.unwrap().unwrap();
        assert_eq!(doc.get("pageviews"), Some(&DocValue::Integer(6)));
        assert_eq!(doc.get("updatedAt"), Some(&DocValue::Timestamp(now)));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = MemoryDocumentStore::new();
        let writes = (1..=5)
            .map(|i| Write::Set {
                collection: "events".to_string(),
                id: format!("e{}", i),
                fields: fields(&[
                    ("rank", FieldValue::Value(DocValue::Integer(i))),
                    (
                        "name",
                        FieldValue::Value(DocValue::from(if i % 2 == 0 { "even" } else { "odd" })),
                    ),
                ]),
            })
            .collect();
        store.commit(writes).await.unwrap();

        let docs = store
            .query(
                "events",
                Query::new()
                    .filter("name", FilterOp::Eq, "odd")
                    .filter("rank", FilterOp::Gte, 2i64)
                    .order_by("rank", Direction::Descending)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "e5");
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let store = MemoryDocumentStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.get("c", "a").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_failing(false);
        assert!(store.get("c", "a").await.unwrap().is_none());
    }
}
