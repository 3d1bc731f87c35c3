//! Hook abstraction
//!
//! A [`ClickHook`] owns the lifecycle of one OS-level global mouse hook. While
//! installed it hands every button-down event, in order, to a [`ClickSink`]
//! before the event is delivered anywhere else, and applies the sink's veto
//! through the [`Suppressor`] it passes along.

use super::suppress::Suppressor;
use super::types::{ClickEvent, Decision};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on how long an install may wait for the OS
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Receiver of hook callbacks. Implemented by the debounce engine.
pub trait ClickSink: Send + Sync {
    /// Decide one click. Runs on the hook thread, inside the OS callback.
    fn on_click(&self, event: ClickEvent, suppressor: &mut dyn Suppressor) -> Decision;

    /// The OS tore the hook down on its own; no more clicks will arrive.
    fn on_hook_lost(&self, reason: &str);
}

/// OS-level global mouse hook.
pub trait ClickHook: Send {
    /// Install the hook and start delivering clicks to `sink`.
    ///
    /// # Errors
    /// Returns [`crate::Error::HookInstall`] if the OS refuses the hook or does
    /// not confirm it within the install timeout. Nothing stays installed on
    /// error.
    fn install(&mut self, sink: Arc<dyn ClickSink>) -> crate::Result<()>;

    /// Remove the hook. Idempotent; also cleans up after a lost hook.
    fn uninstall(&mut self);

    /// Whether clicks are currently being delivered
    fn is_installed(&self) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// The global hook for the current platform.
pub fn platform_hook() -> Box<dyn ClickHook> {
    platform_hook_with_timeout(DEFAULT_INSTALL_TIMEOUT)
}

/// The global hook for the current platform, with a custom install bound.
#[cfg(target_os = "macos")]
pub fn platform_hook_with_timeout(install_timeout: Duration) -> Box<dyn ClickHook> {
    Box::new(super::event_tap::EventTap::new(install_timeout))
}

/// The global hook for the current platform, with a custom install bound.
#[cfg(not(target_os = "macos"))]
pub fn platform_hook_with_timeout(_install_timeout: Duration) -> Box<dyn ClickHook> {
    Box::new(super::unsupported::UnsupportedHook)
}
