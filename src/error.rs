//! Error types shared across the receiver.

use std::io;
use thiserror::Error;

use crate::config::validation::{join, ValidationError};
use crate::rpc::ServiceKind;

/// Errors surfaced to callers of the [`Receiver`](crate::Receiver) lifecycle API.
///
/// Idempotency signals ("already started", "already stopped" on a second
/// `stop`) are not errors; they are reported as
/// [`Outcome::AlreadyDone`](crate::lifecycle::Outcome::AlreadyDone).
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The listener could not be acquired.
    #[error("failed to bind to address {address:?}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The options failed validation; nothing was bound.
    #[error("invalid receiver options: {}", join(.0))]
    InvalidOptions(Vec<ValidationError>),

    /// The receiver was stopped and cannot be started again.
    #[error("receiver already stopped")]
    AlreadyStopped,

    /// Constructing the receiver implementation for a service kind failed.
    #[error("failed to register {kind} service: {reason}")]
    Registration { kind: ServiceKind, reason: String },

    /// A background wiring or serve step failed within the startup window.
    #[error("receiver failed to start: {0}")]
    StartupProbe(#[from] ServeError),
}

/// Terminal errors produced by the background server loops.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Wiring the gateway routes onto the RPC endpoint failed.
    #[error("gateway wiring failed: {0}")]
    GatewayWiring(String),

    /// Accepting on the shared listener failed.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A derived listener was closed by its demultiplexer.
    #[error("{0} listener closed")]
    ListenerClosed(&'static str),

    /// The shared listener was already handed to a demultiplexer.
    #[error("listener is not available")]
    ListenerUnavailable,

    /// The server tasks went away before reporting an outcome.
    #[error("server tasks aborted during startup")]
    Aborted,
}

/// Error returned by a sink that could not take a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink refused the batch (back-pressure, shutting down).
    #[error("batch rejected: {0}")]
    Rejected(String),

    /// Any other sink failure.
    #[error("sink failure: {0}")]
    Internal(String),
}
