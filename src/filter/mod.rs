//! Debounce filter
//!
//! [`state`] holds the pure decision logic; [`engine`] wraps it with locking,
//! hook lifecycle and notifications.

pub mod state;
pub mod engine;

pub use engine::DebounceEngine;
pub use state::{BlockedEvent, FilterState, FilterStatus, DEFAULT_THRESHOLD_MS};
