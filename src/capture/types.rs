//! Click Event Types
//!
//! Types shared between the hook adapters and the debounce engine.

use crate::time::timebase::Timestamp;
use serde::{Deserialize, Serialize};

/// Mouse button that produced a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Any other button, by hardware button number (2 = middle)
    Other(u8),
}

impl MouseButton {
    /// Map a hardware button number as reported by the OS (0 = left, 1 = right)
    pub fn from_number(number: u8) -> Self {
        match number {
            0 => MouseButton::Left,
            1 => MouseButton::Right,
            n => MouseButton::Other(n),
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Other(n) => write!(f, "button{}", n),
        }
    }
}

/// A button-down event observed by a hook.
///
/// Transient: the engine keeps nothing of it except `occurred_at` when the
/// click is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Button that was pressed
    pub button: MouseButton,
    /// When the press happened, on the shared click timebase
    pub occurred_at: Timestamp,
}

impl ClickEvent {
    pub fn new(button: MouseButton, occurred_at: Timestamp) -> Self {
        Self { button, occurred_at }
    }

    /// Left click at the given millisecond offset (handy for scripted input)
    pub fn left_at_millis(millis: u64) -> Self {
        Self::new(MouseButton::Left, Timestamp::from_millis(millis))
    }

    /// Click captured right now
    pub fn now(button: MouseButton) -> Self {
        Self::new(button, Timestamp::now())
    }
}

/// Outcome of evaluating one click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Filter stopped; the click was not evaluated
    Ignored,
    /// Click passed through and became the new reference point
    Accepted,
    /// Click was consumed, `delta_ms` after the last accepted click
    Blocked { delta_ms: u64 },
}
