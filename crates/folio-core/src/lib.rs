//! Core utilities and types shared across all Folio crates

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;
pub mod types;
pub mod utils;
mod constants;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use constants::*;
pub use error::*;
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use tasks::{Debouncer, TaskHandle, Throttle};
pub use types::*;
pub use utils::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;

// Re-export standard datetime type for use across all crates
pub use types::UtcDateTime;
