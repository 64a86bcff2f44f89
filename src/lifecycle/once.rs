//! One-shot execution guard.

use parking_lot::Mutex;

/// Result of an idempotent lifecycle operation that did not fail.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This call performed the side effect.
    Done,
    /// The side effect was already performed (or attempted) by an earlier call.
    AlreadyDone,
}

impl Outcome {
    /// Whether this call was the one that did the work.
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }
}

/// Runs an action at most once across any number of concurrent callers.
///
/// Concurrent callers block until the first invocation finishes and then
/// observe [`Outcome::AlreadyDone`]. A failed first attempt is still recorded:
/// nobody retries it.
#[derive(Debug, Default)]
pub struct OnceGuard {
    attempted: Mutex<bool>,
}

impl OnceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `action` if no earlier call has.
    pub fn call<E, F>(&self, action: F) -> Result<Outcome, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let mut attempted = self.attempted.lock();
        if *attempted {
            return Ok(Outcome::AlreadyDone);
        }
        *attempted = true;
        action().map(|()| Outcome::Done)
    }

    /// Whether the action has been attempted.
    pub fn is_attempted(&self) -> bool {
        *self.attempted.lock()
    }
}
