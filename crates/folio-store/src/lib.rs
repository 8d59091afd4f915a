//! # folio-store
//!
//! Persistence of analytics entities over a document database.
//!
//! The crate is split in two layers:
//!
//! - **DocumentStore**: the trait every backend implements (atomic batched
//!   writes with server-side transforms, point reads, filtered queries).
//!   [`MemoryDocumentStore`] and [`FileDocumentStore`] ship with the crate.
//! - **AnalyticsStore**: the analytics operations (sessions, visitors,
//!   pageviews, events, daily aggregates, dashboard) expressed as writes and
//!   queries against any `DocumentStore`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use folio_store::{AnalyticsStore, MemoryDocumentStore};
//!
//! # async fn example() {
//! let store = AnalyticsStore::new(Arc::new(MemoryDocumentStore::new()));
//! let sessions = store.get_recent_sessions(10).await;
//! assert!(sessions.is_empty());
//! # }
//! ```

pub mod analytics_store;
pub mod codec;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod patch;
pub mod schema;
pub mod traits;

// Re-export commonly used items
pub use analytics_store::{daily_key, AnalyticsStore, DEFAULT_RECENT_EVENTS, DEFAULT_RECENT_SESSIONS};
pub use codec::{decode, encode, sanitize_properties, MAX_NESTING_DEPTH};
pub use dashboard::{compute_dashboard, percent_change, PeriodRecords};
pub use document::{DocValue, Document, Fields, ValueType};
pub use error::{Result, StoreError};
pub use file::FileDocumentStore;
pub use memory::{DocumentSet, MemoryDocumentStore};
pub use patch::{PageviewPatch, SessionPatch};
pub use schema::{CollectionSchema, Collections};
pub use traits::{
    Direction, DocumentStore, FieldValue, Filter, FilterOp, Query, Write, WriteFields,
};
