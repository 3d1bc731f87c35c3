//! Click capture module
//!
//! OS hook adapters feed button-down events synchronously into a
//! [`ClickSink`] and apply its veto. The decision runs inside the OS callback,
//! so suppression never waits on anything but the engine's state guard.

pub mod types;
pub mod hook;
pub mod suppress;
pub mod manual;
pub mod unsupported;
#[cfg(target_os = "macos")]
pub mod event_tap;

pub use types::*;
pub use hook::{platform_hook, platform_hook_with_timeout, ClickHook, ClickSink};
pub use manual::{ManualHook, ManualHookHandle};
pub use suppress::{CallbackVeto, NoVeto, Suppressor};
#[cfg(target_os = "macos")]
pub use event_tap::{check_accessibility_permissions, request_accessibility_permissions, EventTap};
