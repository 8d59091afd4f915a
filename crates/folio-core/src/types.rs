//! Shared type aliases

use chrono::{DateTime, Utc};

/// Standard UTC timestamp used across all Folio crates: entity timestamps,
/// document store timestamp values and dashboard query ranges
pub type UtcDateTime = DateTime<Utc>;
