//! Fallback hook for platforms without a global click hook.

use super::hook::{ClickHook, ClickSink};
use std::sync::Arc;

/// Hook that can never be installed.
#[derive(Debug, Default)]
pub struct UnsupportedHook;

impl ClickHook for UnsupportedHook {
    fn install(&mut self, _sink: Arc<dyn ClickSink>) -> crate::Result<()> {
        Err(crate::Error::HookInstall(format!(
            "platform '{}' does not support global mouse hooks",
            std::env::consts::OS
        )))
    }

    fn uninstall(&mut self) {}

    fn is_installed(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}
