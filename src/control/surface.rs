//! Operation surface for binding layers
//!
//! Wraps a [`DebounceEngine`] and an [`AutostartProvider`] behind the
//! operations a UI or IPC layer calls. Inputs arrive as signed integers and
//! are validated here; errors leave as [`ErrorPayload`].

use super::autostart::AutostartProvider;
use crate::filter::{DebounceEngine, FilterStatus};
use crate::notify::{NotificationKind, Subscription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Serialized form of an error crossing into a binding layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
}

impl From<&crate::Error> for ErrorPayload {
    fn from(err: &crate::Error) -> Self {
        Self {
            name: err.name().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<crate::Error> for ErrorPayload {
    fn from(err: crate::Error) -> Self {
        Self::from(&err)
    }
}

/// Convert a caller-supplied threshold, rejecting negatives.
pub fn validate_threshold(threshold_ms: i64) -> crate::Result<u64> {
    u64::try_from(threshold_ms).map_err(|_| {
        crate::Error::InvalidArgument(format!(
            "threshold_ms must be >= 0, got {}",
            threshold_ms
        ))
    })
}

pub struct ControlSurface {
    engine: Arc<DebounceEngine>,
    autostart: Box<dyn AutostartProvider>,
}

impl ControlSurface {
    pub fn new(engine: Arc<DebounceEngine>, autostart: Box<dyn AutostartProvider>) -> Self {
        Self { engine, autostart }
    }

    pub fn engine(&self) -> &Arc<DebounceEngine> {
        &self.engine
    }

    /// Start (or restart) the filter.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative threshold, `HookInstall` if the OS
    /// hook cannot be established. State is unchanged on either.
    pub fn start_filter(&self, threshold_ms: i64) -> crate::Result<FilterStatus> {
        let threshold_ms = validate_threshold(threshold_ms)?;
        self.engine.start(threshold_ms)
    }

    pub fn stop_filter(&self) -> crate::Result<FilterStatus> {
        Ok(self.engine.stop())
    }

    /// Change the threshold without restarting.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative threshold.
    pub fn update_threshold(&self, threshold_ms: i64) -> crate::Result<FilterStatus> {
        let threshold_ms = validate_threshold(threshold_ms)?;
        Ok(self.engine.update_threshold(threshold_ms))
    }

    pub fn get_filter_status(&self) -> FilterStatus {
        self.engine.get_status()
    }

    pub fn get_autostart_enabled(&self) -> crate::Result<bool> {
        self.autostart.is_enabled()
    }

    pub fn set_autostart_enabled(&self, enabled: bool) -> crate::Result<bool> {
        debug!("Setting autostart via {} to {}", self.autostart.name(), enabled);
        self.autostart.set_enabled(enabled)
    }

    pub fn subscribe(&self) -> Subscription {
        self.engine.subscribe()
    }

    pub fn subscribe_to(&self, kind: NotificationKind) -> Subscription {
        self.engine.subscribe_to(kind)
    }
}
