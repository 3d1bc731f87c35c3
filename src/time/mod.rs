//! Click timing
//!
//! Monotonic nanosecond timestamps shared by the hook and the debounce engine.

pub mod timebase;

pub use timebase::{Timebase, Timestamp};
