//! Startup probe.
//!
//! Serve loops block forever when healthy, so there is no completion signal
//! to wait for. The probe races the shared error channel against a fixed
//! budget: an error inside the budget fails the start, silence means the
//! loops are assumed to be running. Anything reported after the budget is
//! not observed by the caller.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ServeError;

/// Default startup budget.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sending half handed to every background loop.
pub type ErrorReporter = mpsc::UnboundedSender<ServeError>;

/// Races background failures against a timeout.
#[derive(Debug, Clone, Copy)]
pub struct StartupProbe {
    timeout: Duration,
}

impl StartupProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create the shared error channel.
    pub fn channel() -> (ErrorReporter, mpsc::UnboundedReceiver<ServeError>) {
        mpsc::unbounded_channel()
    }

    /// Wait for the first reported error or the timeout, whichever comes first.
    ///
    /// The receiver is consumed so that late reports are dropped.
    pub async fn wait(
        self,
        mut errors: mpsc::UnboundedReceiver<ServeError>,
    ) -> Result<(), ServeError> {
        tokio::select! {
            received = errors.recv() => match received {
                Some(err) => Err(err),
                None => Err(ServeError::Aborted),
            },
            _ = tokio::time::sleep(self.timeout) => Ok(()),
        }
    }
}

impl Default for StartupProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}
