//! In-process click source
//!
//! [`ManualHook`] behaves like an OS hook but is driven from code through a
//! [`ManualHookHandle`]: clicks are injected explicitly, installs can be made
//! to fail, and the hook can be "evicted" the way an OS drops a stalled tap.
//! Used by the `simulate` command, embedders that receive clicks from
//! elsewhere, and tests.

use super::hook::{ClickHook, ClickSink};
use super::suppress::Suppressor;
use super::types::{ClickEvent, Decision};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct ManualShared {
    sink: Mutex<Option<Arc<dyn ClickSink>>>,
    install_failure: Mutex<Option<String>>,
    veto_fails: AtomicBool,
    installs: AtomicU64,
    uninstalls: AtomicU64,
    passed: AtomicU64,
    consumed: AtomicU64,
}

/// Hook driven by injected clicks.
pub struct ManualHook {
    shared: Arc<ManualShared>,
}

/// Control handle for a [`ManualHook`], usable from any thread.
#[derive(Clone)]
pub struct ManualHookHandle {
    shared: Arc<ManualShared>,
}

impl ManualHook {
    /// Create a hook and the handle that drives it.
    pub fn new() -> (Self, ManualHookHandle) {
        let shared = Arc::new(ManualShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ManualHookHandle { shared },
        )
    }
}

impl ClickHook for ManualHook {
    fn install(&mut self, sink: Arc<dyn ClickSink>) -> crate::Result<()> {
        if let Some(reason) = self.shared.install_failure.lock().take() {
            return Err(crate::Error::HookInstall(reason));
        }

        let mut slot = self.shared.sink.lock();
        if slot.is_some() {
            return Err(crate::Error::HookInstall("manual hook already installed".into()));
        }
        *slot = Some(sink);
        self.shared.installs.fetch_add(1, Ordering::SeqCst);
        debug!("Manual hook installed");
        Ok(())
    }

    fn uninstall(&mut self) {
        if self.shared.sink.lock().take().is_some() {
            self.shared.uninstalls.fetch_add(1, Ordering::SeqCst);
            debug!("Manual hook uninstalled");
        }
    }

    fn is_installed(&self) -> bool {
        self.shared.sink.lock().is_some()
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Veto for injected clicks; optionally refuses to consume.
struct ManualVeto {
    fails: bool,
    consumed: bool,
}

impl Suppressor for ManualVeto {
    fn consume(&mut self) -> crate::Result<()> {
        if self.fails {
            return Err(crate::Error::Suppression("injected veto failure".into()));
        }
        self.consumed = true;
        Ok(())
    }
}

impl ManualHookHandle {
    /// Inject one click.
    ///
    /// Returns `None` when the hook is not installed: the click reaches the
    /// system unobserved, exactly like a real click with no hook in place.
    pub fn click(&self, event: ClickEvent) -> Option<Decision> {
        let sink = self.shared.sink.lock().clone()?;

        let mut veto = ManualVeto {
            fails: self.shared.veto_fails.load(Ordering::SeqCst),
            consumed: false,
        };
        let decision = sink.on_click(event, &mut veto);

        if veto.consumed {
            self.shared.consumed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.shared.passed.fetch_add(1, Ordering::SeqCst);
        }
        Some(decision)
    }

    /// Simulate the OS evicting the hook while it is installed.
    pub fn lose_hook(&self, reason: &str) {
        let sink = self.shared.sink.lock().take();
        if let Some(sink) = sink {
            sink.on_hook_lost(reason);
        }
    }

    /// Make the next install fail with `reason`.
    pub fn fail_next_install(&self, reason: &str) {
        *self.shared.install_failure.lock() = Some(reason.to_string());
    }

    /// Make every veto attempt fail (or succeed again).
    pub fn set_veto_failure(&self, fails: bool) {
        self.shared.veto_fails.store(fails, Ordering::SeqCst);
    }

    pub fn is_installed(&self) -> bool {
        self.shared.sink.lock().is_some()
    }

    /// Number of successful installs so far
    pub fn install_count(&self) -> u64 {
        self.shared.installs.load(Ordering::SeqCst)
    }

    /// Number of uninstalls that removed a live hook
    pub fn uninstall_count(&self) -> u64 {
        self.shared.uninstalls.load(Ordering::SeqCst)
    }

    /// Injected clicks that reached the system
    pub fn passed_count(&self) -> u64 {
        self.shared.passed.load(Ordering::SeqCst)
    }

    /// Injected clicks that were swallowed
    pub fn consumed_count(&self) -> u64 {
        self.shared.consumed.load(Ordering::SeqCst)
    }
}
