//! # Click Debounce
//!
//! A global mouse click debounce filter. Clicks that arrive sooner than a
//! configurable threshold after the previous accepted click are consumed at
//! the OS input layer before any application sees them, neutralizing mouse
//! switches that double-fire.
//!
//! ## Quick Start
//!
//! ```no_run
//! use click_debounce::capture::platform_hook;
//! use click_debounce::filter::DebounceEngine;
//! use click_debounce::notify::Notification;
//!
//! let engine = DebounceEngine::new(platform_hook(), 100);
//! let events = engine.subscribe();
//!
//! let status = engine.start(80).expect("hook install failed");
//! assert!(status.running);
//!
//! for notification in events.iter() {
//!     if let Notification::ClickBlocked(blocked) = notification {
//!         println!("blocked click {}ms after the last one", blocked.delta_ms);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`capture`]: OS hook adapters and the suppression (veto) mechanism
//! - [`filter`]: the debounce state machine and engine
//! - [`notify`]: non-blocking status / blocked-click fan-out
//! - [`control`]: operation surface for binding layers, plus autostart
//! - [`time`]: monotonic click timestamps
//! - [`app`]: CLI and configuration management
//!
//! ## Event Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  OS hook    │───▶│  Debounce   │───▶│  Suppress   │    │ Subscribers │
//! │ (capture)   │    │  decision   │    │  or pass    │    │             │
//! └─────────────┘    └──────┬──────┘    └─────────────┘    └─────────────┘
//!                           │                                     ▲
//!                           └────────────▶ Publisher ─────────────┘
//! ```
//!
//! ## Permissions
//!
//! On macOS the event tap requires Accessibility permissions:
//! System Settings → Privacy & Security → Accessibility

pub mod time;
pub mod capture;
pub mod filter;
pub mod notify;
pub mod control;
pub mod app;

// Re-export commonly used types
pub use capture::types::{ClickEvent, MouseButton};
pub use control::ControlSurface;
pub use filter::{BlockedEvent, DebounceEngine, FilterStatus};
pub use notify::{Notification, Subscription};
pub use time::Timestamp;

/// Result type alias for the click filter
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the click filter
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Hook install failed: {0}")]
    HookInstall(String),

    #[error("Hook lost: {0}")]
    HookLost(String),

    #[error("Suppression failed: {0}")]
    Suppression(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Autostart error: {0}")]
    Autostart(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable camelCase kind, used when errors cross into a binding layer.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalidArgument",
            Error::HookInstall(_) => "hookInstall",
            Error::HookLost(_) => "hookLost",
            Error::Suppression(_) => "suppression",
            Error::Unsupported(_) => "unsupported",
            Error::Autostart(_) => "autostart",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}
