//! Debounce state machine
//!
//! [`FilterState`] is the single source of truth for the filter: whether it is
//! running, the threshold, the blocked-click counter and the last accepted
//! click. It knows nothing about locking or notifications; the engine wraps it
//! in a mutex and publishes what it returns.

use crate::capture::suppress::Suppressor;
use crate::capture::types::{ClickEvent, Decision};
use crate::time::timebase::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Threshold used until someone picks another one
pub const DEFAULT_THRESHOLD_MS: u64 = 100;

/// Point-in-time copy of the externally visible filter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterStatus {
    pub running: bool,
    pub threshold_ms: u64,
    pub blocked_clicks: u64,
}

/// Payload for a suppressed click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockedEvent {
    /// Whole milliseconds since the last accepted click
    pub delta_ms: u64,
}

/// Mutable filter state. Starts stopped.
#[derive(Debug, Clone)]
pub struct FilterState {
    running: bool,
    threshold_ms: u64,
    blocked_clicks: u64,
    last_accepted_at: Option<Timestamp>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MS)
    }
}

impl FilterState {
    /// Create a stopped state with the given threshold
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            running: false,
            threshold_ms,
            blocked_clicks: 0,
            last_accepted_at: None,
        }
    }

    pub fn status(&self) -> FilterStatus {
        FilterStatus {
            running: self.running,
            threshold_ms: self.threshold_ms,
            blocked_clicks: self.blocked_clicks,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_accepted_at(&self) -> Option<Timestamp> {
        self.last_accepted_at
    }

    /// Enter (or re-enter) the running state with fresh counters.
    pub fn arm(&mut self, threshold_ms: u64) {
        self.running = true;
        self.threshold_ms = threshold_ms;
        self.blocked_clicks = 0;
        self.last_accepted_at = None;
    }

    /// Leave the running state, keeping threshold and counter for inspection.
    ///
    /// Returns false if the filter was already stopped.
    pub fn disarm(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        was_running
    }

    /// Change the threshold used by the next evaluated click.
    pub fn set_threshold(&mut self, threshold_ms: u64) {
        self.threshold_ms = threshold_ms;
    }

    /// Decide one click.
    ///
    /// A click is blocked iff the time since the last accepted click is
    /// strictly below the threshold; the first click after `arm` is always
    /// accepted. A block only counts once `suppressor` has consumed the event.
    /// If it cannot, the click is accepted instead.
    pub fn evaluate(&mut self, event: &ClickEvent, suppressor: &mut dyn Suppressor) -> Decision {
        if !self.running {
            return Decision::Ignored;
        }

        let threshold = Duration::from_millis(self.threshold_ms);
        let elapsed = self
            .last_accepted_at
            .map(|prev| event.occurred_at.duration_since(prev));

        match elapsed {
            Some(elapsed) if elapsed < threshold => {
                let delta_ms = elapsed.as_millis() as u64;
                match suppressor.consume() {
                    Ok(()) => {
                        self.blocked_clicks = self.blocked_clicks.saturating_add(1);
                        Decision::Blocked { delta_ms }
                    }
                    Err(e) => {
                        warn!(
                            "Could not suppress {} click ({}); letting it through",
                            event.button, e
                        );
                        self.accept(event)
                    }
                }
            }
            _ => self.accept(event),
        }
    }

    fn accept(&mut self, event: &ClickEvent) -> Decision {
        self.last_accepted_at = Some(event.occurred_at);
        Decision::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::suppress::{CallbackVeto, NoVeto};

    fn click(state: &mut FilterState, at_ms: u64) -> Decision {
        state.evaluate(&ClickEvent::left_at_millis(at_ms), &mut CallbackVeto::new())
    }

    fn running(threshold_ms: u64) -> FilterState {
        let mut state = FilterState::new(threshold_ms);
        state.arm(threshold_ms);
        state
    }

    #[test]
    fn test_new_state_is_stopped() {
        let state = FilterState::default();
        assert_eq!(
            state.status(),
            FilterStatus {
                running: false,
                threshold_ms: DEFAULT_THRESHOLD_MS,
                blocked_clicks: 0,
            }
        );
        assert!(state.last_accepted_at().is_none());
    }

    #[test]
    fn test_stopped_state_ignores_clicks() {
        let mut state = FilterState::new(100);
        assert_eq!(click(&mut state, 0), Decision::Ignored);
        assert_eq!(click(&mut state, 1), Decision::Ignored);
        assert_eq!(state.status().blocked_clicks, 0);
        assert!(state.last_accepted_at().is_none());
    }

    #[test]
    fn test_first_click_accepted() {
        let mut state = running(100);
        assert_eq!(click(&mut state, 0), Decision::Accepted);
        assert_eq!(state.last_accepted_at(), Some(Timestamp::from_millis(0)));
    }

    #[test]
    fn test_block_and_accept_sequence() {
        let mut state = running(100);
        assert_eq!(click(&mut state, 0), Decision::Accepted);
        assert_eq!(click(&mut state, 50), Decision::Blocked { delta_ms: 50 });
        assert_eq!(click(&mut state, 150), Decision::Accepted);
        assert_eq!(state.status().blocked_clicks, 1);
    }

    #[test]
    fn test_boundary_is_accepted() {
        let mut state = running(100);
        click(&mut state, 0);
        assert_eq!(click(&mut state, 100), Decision::Accepted);
    }

    #[test]
    fn test_just_below_boundary_is_blocked() {
        let mut state = running(100);
        state.evaluate(&ClickEvent::left_at_millis(0), &mut CallbackVeto::new());
        let almost = ClickEvent::new(
            crate::capture::MouseButton::Left,
            Timestamp::from_nanos(99_999_999),
        );
        assert_eq!(
            state.evaluate(&almost, &mut CallbackVeto::new()),
            Decision::Blocked { delta_ms: 99 }
        );
    }

    #[test]
    fn test_blocked_click_does_not_move_reference() {
        let mut state = running(100);
        click(&mut state, 0);
        click(&mut state, 60);
        click(&mut state, 90);
        assert_eq!(state.last_accepted_at(), Some(Timestamp::from_millis(0)));
        // 110ms after the accepted click, even though only 20ms after a blocked one
        assert_eq!(click(&mut state, 110), Decision::Accepted);
    }

    #[test]
    fn test_zero_threshold_never_blocks() {
        let mut state = running(0);
        for _ in 0..5 {
            assert_eq!(click(&mut state, 10), Decision::Accepted);
        }
        assert_eq!(state.status().blocked_clicks, 0);
    }

    #[test]
    fn test_out_of_order_timestamp_counts_as_zero_elapsed() {
        let mut state = running(100);
        click(&mut state, 500);
        assert_eq!(click(&mut state, 400), Decision::Blocked { delta_ms: 0 });
    }

    #[test]
    fn test_arm_resets_counters() {
        let mut state = running(100);
        click(&mut state, 0);
        click(&mut state, 10);
        assert_eq!(state.status().blocked_clicks, 1);

        state.arm(200);
        assert_eq!(state.status().blocked_clicks, 0);
        assert_eq!(state.status().threshold_ms, 200);
        assert!(state.last_accepted_at().is_none());
        // First click after re-arm accepted even though it is close to the old one
        assert_eq!(click(&mut state, 20), Decision::Accepted);
    }

    #[test]
    fn test_disarm_keeps_values() {
        let mut state = running(100);
        click(&mut state, 0);
        click(&mut state, 10);

        assert!(state.disarm());
        assert!(!state.disarm());
        let status = state.status();
        assert!(!status.running);
        assert_eq!(status.threshold_ms, 100);
        assert_eq!(status.blocked_clicks, 1);
    }

    #[test]
    fn test_set_threshold_keeps_counter_and_reference() {
        let mut state = running(100);
        click(&mut state, 0);
        click(&mut state, 10);

        state.set_threshold(300);
        assert_eq!(state.status().blocked_clicks, 1);
        assert_eq!(state.last_accepted_at(), Some(Timestamp::from_millis(0)));
        assert_eq!(click(&mut state, 250), Decision::Blocked { delta_ms: 250 });
    }

    #[test]
    fn test_suppression_failure_fails_open() {
        let mut state = running(100);
        click(&mut state, 0);

        let decision = state.evaluate(&ClickEvent::left_at_millis(30), &mut NoVeto);
        assert_eq!(decision, Decision::Accepted);
        assert_eq!(state.status().blocked_clicks, 0);
        assert_eq!(state.last_accepted_at(), Some(Timestamp::from_millis(30)));
    }

    #[test]
    fn test_status_serialization() {
        let status = FilterStatus {
            running: true,
            threshold_ms: 80,
            blocked_clicks: 3,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"running":true,"threshold_ms":80,"blocked_clicks":3}"#);

        let blocked = serde_json::to_string(&BlockedEvent { delta_ms: 12 }).unwrap();
        assert_eq!(blocked, r#"{"delta_ms":12}"#);
    }
}
