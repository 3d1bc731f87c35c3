//! Monotonic click timebase
//!
//! Click timestamps are stored as raw nanoseconds since a process-wide origin
//! captured on first use. Only differences between timestamps are meaningful;
//! the origin itself never leaves the process.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Process-wide origin, initialized once
static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Monotonic timebase shared by every event source.
#[derive(Debug, Clone, Copy)]
pub struct Timebase;

impl Timebase {
    /// Pin the origin. Calling this is optional; the first `now()` does it too.
    pub fn init() {
        ORIGIN.get_or_init(Instant::now);
    }

    /// Nanoseconds elapsed since the origin.
    #[inline]
    pub fn now_nanos() -> u64 {
        let origin = *ORIGIN.get_or_init(Instant::now);
        // u64 nanoseconds cover ~584 years of uptime
        origin.elapsed().as_nanos() as u64
    }
}

/// A point on the click timebase, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw nanoseconds.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create a timestamp from microseconds.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    /// Create a timestamp from milliseconds.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Capture the current time.
    #[inline]
    pub fn now() -> Self {
        Self(Timebase::now_nanos())
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Time elapsed since an earlier timestamp.
    ///
    /// Saturates to zero when `earlier` is actually later, so an out-of-order
    /// timestamp never underflows.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Timestamp(nanos))
    }
}
