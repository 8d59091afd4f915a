//! Collection names and the per-collection layout the codec needs

/// Stable names of the document collections
pub struct Collections;

impl Collections {
    pub const VISITORS: &'static str = "analytics_visitors";
    pub const SESSIONS: &'static str = "analytics_sessions";
    pub const PAGEVIEWS: &'static str = "analytics_pageviews";
    pub const EVENTS: &'static str = "analytics_events";
    pub const DAILY_STATS: &'static str = "analytics_daily_stats";
}

/// Bookkeeping fields stamped by the store on write
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Layout of one collection: which top-level fields hold timestamps
#[derive(Debug, Clone, Copy)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub timestamp_fields: &'static [&'static str],
}

impl CollectionSchema {
    pub fn is_timestamp(&self, field: &str) -> bool {
        self.timestamp_fields.contains(&field)
    }
}

pub const VISITORS: CollectionSchema = CollectionSchema {
    name: Collections::VISITORS,
    timestamp_fields: &["firstSeenAt", "lastSeenAt", CREATED_AT, UPDATED_AT],
};

pub const SESSIONS: CollectionSchema = CollectionSchema {
    name: Collections::SESSIONS,
    timestamp_fields: &["startedAt", "lastActivityAt", CREATED_AT, UPDATED_AT],
};

pub const PAGEVIEWS: CollectionSchema = CollectionSchema {
    name: Collections::PAGEVIEWS,
    timestamp_fields: &["timestamp", CREATED_AT],
};

pub const EVENTS: CollectionSchema = CollectionSchema {
    name: Collections::EVENTS,
    timestamp_fields: &["timestamp", CREATED_AT],
};

pub const DAILY_STATS: CollectionSchema = CollectionSchema {
    name: Collections::DAILY_STATS,
    timestamp_fields: &[UPDATED_AT],
};
