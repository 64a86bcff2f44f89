//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (once.rs):
//!     register_trace / register_metrics → OnceGuard → Done | AlreadyDone
//!
//! Start (state.rs + probe.rs):
//!     NotStarted → Starting → spawn wiring + serve loops
//!                           → StartupProbe races error channel vs timeout
//!                → Running
//!
//! Stop (state.rs):
//!     * → Stopped: close RPC server, close gateway, close listener
//! ```
//!
//! # Design Decisions
//! - One-shot operations never retry; a failed first attempt still counts
//! - Transitions happen only while the receiver lock is held
//! - Stopped is terminal

pub mod once;
pub mod probe;
pub mod state;

pub use once::{OnceGuard, Outcome};
pub use probe::StartupProbe;
pub use state::{LifecycleState, Transition};
