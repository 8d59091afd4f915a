//! Pageview, event and scroll tracking

pub mod catalog;
pub mod dispatcher;
pub mod events;
pub mod pageview;
pub mod scroll;

pub use catalog::{EventCatalog, TrackEvent};
pub use dispatcher::{subscriber, EventDispatcher, EventSubscriber, EventSubscription};
pub use events::{EventOptions, EventTracker, FlushHandler};
pub use pageview::{collect_performance, PageviewChange, PageviewTracker, MAX_RESOURCE_ENTRIES};
pub use scroll::{scroll_depth, ScrollDimensions, ScrollState, ScrollTracker};
