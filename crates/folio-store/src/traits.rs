use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::document::{DocValue, Document};
use crate::error::Result;

/// Value of a field in a write: a literal, or a transform the store applies
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(DocValue),
    /// Add to the stored number (missing or non-numeric counts as 0)
    Increment(i64),
    /// The store's own clock at commit time
    ServerTimestamp,
}

impl From<DocValue> for FieldValue {
    fn from(value: DocValue) -> Self {
        FieldValue::Value(value)
    }
}

pub type WriteFields = BTreeMap<String, FieldValue>;

/// A single mutation inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or fully replace the document
    Set {
        collection: String,
        id: String,
        fields: WriteFields,
    },
    /// Patch top-level fields of an existing document; fails if it does not exist
    Update {
        collection: String,
        id: String,
        fields: WriteFields,
    },
    /// Patch top-level fields, creating the document if it does not exist
    Merge {
        collection: String,
        id: String,
        fields: WriteFields,
    },
}

impl Write {
    pub fn collection(&self) -> &str {
        match self {
            Write::Set { collection, .. }
            | Write::Update { collection, .. }
            | Write::Merge { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Write::Set { id, .. } | Write::Update { id, .. } | Write::Merge { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: DocValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filters are ANDed; documents missing a filtered or ordered field never match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<DocValue>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Core trait that all document store backends implement
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get the type name of this backend
    fn backend_name(&self) -> &'static str;

    /// Apply every write or none of them
    async fn commit(&self, writes: Vec<Write>) -> Result<()>;

    /// Fetch a single document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Run a filtered, ordered, limited query over one collection
    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>>;
}
