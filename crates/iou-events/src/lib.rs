//! IOU Event Fan-out
//!
//! Keeps both participants of a debt in sync:
//!
//! - **Rooms** (`user:<id>`, `debt:<id>`) that connected clients subscribe to
//! - **EventBus** delivering each committed change at most once, best effort
//! - **NotificationSink** keeping a durable, queryable record per user

pub mod error;
pub mod rooms;
pub mod events;
pub mod bus;
pub mod notifications;

pub use error::EventError;
pub use rooms::Room;
pub use events::{DebtEvent, DebtEventKind};
pub use bus::{BroadcastEventBus, EventBus};
pub use notifications::{InMemoryNotificationSink, Notification, NotificationRefs, NotificationSink};
