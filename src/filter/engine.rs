//! Debounce engine
//!
//! Owns the filter state, the OS hook and the notification publisher. Clicks
//! arrive on the hook's thread through [`ClickSink::on_click`]; lifecycle
//! calls arrive from any thread. Lock order is lifecycle (hook) before state.
//!
//! Notifications are published while the state lock is still held, so every
//! subscriber sees status snapshots in the order the state changed. Publishing
//! only ever `try_send`s (evicting the oldest queued entry when full) and never
//! waits on a reader.

use crate::capture::hook::{ClickHook, ClickSink};
use crate::capture::suppress::Suppressor;
use crate::capture::types::{ClickEvent, Decision};
use crate::filter::state::{BlockedEvent, FilterState, FilterStatus};
use crate::notify::{NotificationKind, Publisher, PublisherStats, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State and publisher shared with the hook callback
struct EngineCore {
    state: Mutex<FilterState>,
    publisher: Publisher,
}

impl EngineCore {
    fn evaluate(&self, event: &ClickEvent, suppressor: &mut dyn Suppressor) -> Decision {
        let mut state = self.state.lock();
        let decision = state.evaluate(event, suppressor);

        if let Decision::Blocked { delta_ms } = decision {
            let status = state.status();
            self.publisher.publish_blocked(BlockedEvent { delta_ms });
            self.publisher.publish_status(status);
            drop(state);
            debug!(
                "Blocked {} click {}ms after previous (total {})",
                event.button, delta_ms, status.blocked_clicks
            );
        }
        decision
    }

    /// Disarm and announce it. Returns the resulting status and whether
    /// anything changed.
    fn disarm(&self) -> (bool, FilterStatus) {
        let mut state = self.state.lock();
        let changed = state.disarm();
        let status = state.status();
        if changed {
            self.publisher.publish_status(status);
        }
        (changed, status)
    }
}

impl ClickSink for EngineCore {
    fn on_click(&self, event: ClickEvent, suppressor: &mut dyn Suppressor) -> Decision {
        self.evaluate(&event, suppressor)
    }

    fn on_hook_lost(&self, reason: &str) {
        if let (true, _) = self.disarm() {
            warn!("Click hook lost ({}); filter stopped", reason);
        }
    }
}

/// The click debounce filter.
///
/// All methods take `&self`; share it behind an `Arc` to drive it from
/// several threads.
pub struct DebounceEngine {
    core: Arc<EngineCore>,
    /// Doubles as the lifecycle lock serializing start and stop
    hook: Mutex<Box<dyn ClickHook>>,
}

impl DebounceEngine {
    /// Create a stopped engine
    pub fn new(hook: Box<dyn ClickHook>, default_threshold_ms: u64) -> Self {
        Self::with_publisher(hook, default_threshold_ms, Publisher::default())
    }

    /// Create a stopped engine with a custom subscriber queue capacity
    pub fn with_queue_capacity(
        hook: Box<dyn ClickHook>,
        default_threshold_ms: u64,
        queue_capacity: usize,
    ) -> Self {
        Self::with_publisher(hook, default_threshold_ms, Publisher::new(queue_capacity))
    }

    fn with_publisher(
        hook: Box<dyn ClickHook>,
        default_threshold_ms: u64,
        publisher: Publisher,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                state: Mutex::new(FilterState::new(default_threshold_ms)),
                publisher,
            }),
            hook: Mutex::new(hook),
        }
    }

    /// Start filtering with `threshold_ms`.
    ///
    /// Installs the hook if it is not live, then resets the blocked counter
    /// and the click reference. Calling it while running restarts the filter
    /// with the new threshold. Fails, leaving the filter stopped, if the hook
    /// cannot be installed.
    pub fn start(&self, threshold_ms: u64) -> crate::Result<FilterStatus> {
        let mut hook = self.hook.lock();

        if !hook.is_installed() {
            // Clears whatever a lost hook left behind
            hook.uninstall();
            let sink: Arc<dyn ClickSink> = self.core.clone();
            if let Err(e) = hook.install(sink) {
                warn!("Failed to install {} hook: {}", hook.name(), e);
                self.core.disarm();
                return Err(e);
            }
            debug!("Installed {} hook", hook.name());
        }

        let status = {
            let mut state = self.core.state.lock();
            state.arm(threshold_ms);
            let status = state.status();
            self.core.publisher.publish_status(status);
            status
        };
        info!("Click filter started (threshold {}ms)", threshold_ms);
        Ok(status)
    }

    /// Stop filtering and remove the hook. Idempotent.
    pub fn stop(&self) -> FilterStatus {
        let mut hook = self.hook.lock();

        let (changed, status) = self.core.disarm();
        hook.uninstall();

        if changed {
            info!("Click filter stopped ({} clicks blocked)", status.blocked_clicks);
        }
        status
    }

    /// Change the threshold without touching the counter or the running flag.
    /// Takes effect from the next click.
    pub fn update_threshold(&self, threshold_ms: u64) -> FilterStatus {
        let status = {
            let mut state = self.core.state.lock();
            state.set_threshold(threshold_ms);
            let status = state.status();
            self.core.publisher.publish_status(status);
            status
        };
        debug!("Threshold set to {}ms", threshold_ms);
        status
    }

    pub fn get_status(&self) -> FilterStatus {
        self.core.state.lock().status()
    }

    /// Evaluate a click directly, bypassing the hook.
    ///
    /// For embedders that source clicks themselves.
    pub fn evaluate(&self, event: ClickEvent, suppressor: &mut dyn Suppressor) -> Decision {
        self.core.evaluate(&event, suppressor)
    }

    /// Whether the hook is currently live
    pub fn hook_installed(&self) -> bool {
        self.hook.lock().is_installed()
    }

    pub fn subscribe(&self) -> Subscription {
        self.core.publisher.subscribe()
    }

    pub fn subscribe_to(&self, kind: NotificationKind) -> Subscription {
        self.core.publisher.subscribe_to(kind)
    }

    pub fn publisher_stats(&self) -> Arc<PublisherStats> {
        self.core.publisher.stats()
    }
}

impl Drop for DebounceEngine {
    fn drop(&mut self) {
        self.hook.get_mut().uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::manual::{ManualHook, ManualHookHandle};
    use crate::capture::suppress::CallbackVeto;
    use crate::notify::Notification;

    fn engine(threshold_ms: u64) -> (DebounceEngine, ManualHookHandle) {
        let (hook, handle) = ManualHook::new();
        (DebounceEngine::new(Box::new(hook), threshold_ms), handle)
    }

    #[test]
    fn test_new_engine_is_stopped() {
        let (engine, handle) = engine(100);
        let status = engine.get_status();
        assert!(!status.running);
        assert_eq!(status.threshold_ms, 100);
        assert_eq!(status.blocked_clicks, 0);
        assert!(!handle.is_installed());
    }

    #[test]
    fn test_start_installs_hook() {
        let (engine, handle) = engine(100);
        let status = engine.start(80).unwrap();

        assert!(status.running);
        assert_eq!(status.threshold_ms, 80);
        assert!(handle.is_installed());
        assert!(engine.hook_installed());
    }

    #[test]
    fn test_restart_keeps_single_hook() {
        let (engine, handle) = engine(100);
        engine.start(80).unwrap();
        engine.start(120).unwrap();
        assert_eq!(handle.install_count(), 1);
        assert_eq!(engine.get_status().threshold_ms, 120);
    }

    #[test]
    fn test_stop_uninstalls_and_is_idempotent() {
        let (engine, handle) = engine(100);
        engine.start(80).unwrap();

        let first = engine.stop();
        let second = engine.stop();
        assert!(!first.running);
        assert_eq!(first, second);
        assert!(!handle.is_installed());
        assert_eq!(handle.uninstall_count(), 1);
    }

    #[test]
    fn test_clicks_through_hook() {
        let (engine, handle) = engine(100);
        engine.start(100).unwrap();

        assert_eq!(handle.click(ClickEvent::left_at_millis(0)), Some(Decision::Accepted));
        assert_eq!(
            handle.click(ClickEvent::left_at_millis(40)),
            Some(Decision::Blocked { delta_ms: 40 })
        );
        assert_eq!(handle.consumed_count(), 1);
        assert_eq!(engine.get_status().blocked_clicks, 1);
    }

    #[test]
    fn test_install_failure_leaves_stopped() {
        let (engine, handle) = engine(100);
        handle.fail_next_install("accessibility denied");

        let err = engine.start(80).unwrap_err();
        assert!(matches!(err, crate::Error::HookInstall(_)));
        assert!(!engine.get_status().running);
        assert_eq!(engine.get_status().threshold_ms, 100);
    }

    #[test]
    fn test_hook_lost_stops_and_notifies() {
        let (engine, handle) = engine(100);
        engine.start(80).unwrap();
        let sub = engine.subscribe();

        handle.lose_hook("tap disabled by timeout");

        assert!(!engine.get_status().running);
        assert_eq!(
            sub.drain(),
            vec![Notification::StatusChanged(FilterStatus {
                running: false,
                threshold_ms: 80,
                blocked_clicks: 0,
            })]
        );

        // Restart reinstalls
        engine.start(80).unwrap();
        assert!(handle.is_installed());
        assert_eq!(handle.install_count(), 2);
    }

    #[test]
    fn test_direct_evaluate() {
        let (engine, _handle) = engine(100);
        engine.start(100).unwrap();

        let mut veto = CallbackVeto::new();
        assert_eq!(engine.evaluate(ClickEvent::left_at_millis(0), &mut veto), Decision::Accepted);
        assert!(!veto.is_consumed());

        let mut veto = CallbackVeto::new();
        assert_eq!(
            engine.evaluate(ClickEvent::left_at_millis(10), &mut veto),
            Decision::Blocked { delta_ms: 10 }
        );
        assert!(veto.is_consumed());
    }

    #[test]
    fn test_update_threshold_while_stopped() {
        let (engine, handle) = engine(100);
        let status = engine.update_threshold(250);
        assert!(!status.running);
        assert_eq!(status.threshold_ms, 250);
        assert!(!handle.is_installed());
    }

    #[test]
    fn test_blocked_click_notifications() {
        let (engine, handle) = engine(100);
        engine.start(100).unwrap();
        let sub = engine.subscribe();

        handle.click(ClickEvent::left_at_millis(0));
        handle.click(ClickEvent::left_at_millis(30));

        assert_eq!(
            sub.drain(),
            vec![
                Notification::ClickBlocked(BlockedEvent { delta_ms: 30 }),
                Notification::StatusChanged(FilterStatus {
                    running: true,
                    threshold_ms: 100,
                    blocked_clicks: 1,
                }),
            ]
        );
    }

    #[test]
    fn test_drop_uninstalls_hook() {
        let (engine, handle) = engine(100);
        engine.start(100).unwrap();
        drop(engine);
        assert!(!handle.is_installed());
    }
}
