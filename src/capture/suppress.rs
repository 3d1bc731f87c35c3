//! Click Suppression
//!
//! A blocked click is vetoed from inside the synchronous hook callback. The
//! engine calls [`Suppressor::consume`] while it still holds its state guard,
//! so counting a click and consuming it happen as one step. Whatever goes
//! wrong on this path, the click is let through.

use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Veto handle handed to the engine for a single click.
pub trait Suppressor {
    /// Prevent the click currently being decided from reaching the system.
    fn consume(&mut self) -> crate::Result<()>;
}

/// Veto flag for hooks whose OS facility consumes an event by returning a
/// sentinel from the callback (macOS event taps return NULL).
#[derive(Debug, Default)]
pub struct CallbackVeto {
    consumed: bool,
}

impl CallbackVeto {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the callback must swallow the event
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

impl Suppressor for CallbackVeto {
    #[inline]
    fn consume(&mut self) -> crate::Result<()> {
        self.consumed = true;
        Ok(())
    }
}

/// Suppressor that cannot veto; every attempt fails and the click passes.
///
/// Used by listen-only sources.
#[derive(Debug, Default)]
pub struct NoVeto;

impl Suppressor for NoVeto {
    fn consume(&mut self) -> crate::Result<()> {
        Err(crate::Error::Suppression(
            "event source is listen-only".into(),
        ))
    }
}

/// Run a hook callback body, passing the event through if it panics.
///
/// Unwinding across an OS callback boundary is undefined behaviour, and a
/// panicking decision must not eat the click.
pub fn fail_open<F>(decide: F) -> bool
where
    F: FnOnce() -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(decide)) {
        Ok(consume) => consume,
        Err(_) => {
            error!("Click decision panicked; passing event through");
            false
        }
    }
}
