//! Receiver lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! NotStarted → Starting: first start
//! Starting → Running: startup probe finished (either outcome)
//! * → Stopped: first stop (terminal)
//! ```

/// Lifecycle state of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    NotStarted,
    Starting,
    /// Background loops launched; not a health claim.
    Running,
    Stopped,
}

/// What a caller requesting a transition should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transition happened; the caller owns its side effects.
    Proceed,
    /// The transition already happened earlier.
    AlreadyDone,
    /// The transition is not allowed from the current state.
    Rejected,
}

impl LifecycleState {
    /// Request `NotStarted → Starting`.
    pub fn begin_start(&mut self) -> Transition {
        match self {
            LifecycleState::NotStarted => {
                *self = LifecycleState::Starting;
                Transition::Proceed
            }
            LifecycleState::Starting | LifecycleState::Running => Transition::AlreadyDone,
            LifecycleState::Stopped => Transition::Rejected,
        }
    }

    /// Request `Starting → Running`.
    pub fn finish_start(&mut self) -> Transition {
        match self {
            LifecycleState::Starting => {
                *self = LifecycleState::Running;
                Transition::Proceed
            }
            LifecycleState::Running => Transition::AlreadyDone,
            LifecycleState::NotStarted | LifecycleState::Stopped => Transition::Rejected,
        }
    }

    /// Request `* → Stopped`.
    pub fn stop(&mut self) -> Transition {
        match self {
            LifecycleState::Stopped => Transition::AlreadyDone,
            LifecycleState::NotStarted | LifecycleState::Starting | LifecycleState::Running => {
                *self = LifecycleState::Stopped;
                Transition::Proceed
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, LifecycleState::Stopped)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::NotStarted => "not_started",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
