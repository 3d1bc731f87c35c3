//! Status and notification publishing
//!
//! The engine pushes two kinds of notification: a full status snapshot after
//! every state change, and a blocked-click event after every suppression.

pub mod publisher;

pub use publisher::{
    Notification, NotificationKind, Publisher, PublisherStats, Subscription,
    CLICK_BLOCKED_CHANNEL, DEFAULT_QUEUE_CAPACITY, STATUS_CHANGED_CHANNEL,
};
