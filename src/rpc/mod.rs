//! gRPC side of the receiver.
//!
//! # Data Flow
//! ```text
//! RPC virtual listener
//!     → server.rs (Routes registry, one entry per service name)
//!     → trace.rs / metrics.rs (decode, bound concurrency, hand to sink)
//!     → TraceSink / MetricsSink
//! ```

pub mod metrics;
pub mod server;
pub mod trace;

use std::fmt;

use tonic::Status;

use crate::config::validation::service_problems;
use crate::config::ServiceConfig;
use crate::error::{ReceiverError, SinkError};

pub use self::metrics::MetricsReceiver;
pub use self::server::RpcServer;
pub use self::trace::TraceReceiver;

/// The two kinds of telemetry the receiver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Trace,
    Metrics,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Trace => "trace",
            ServiceKind::Metrics => "metrics",
        }
    }

    /// Fully qualified gRPC service name.
    pub fn service_name(self) -> &'static str {
        match self {
            ServiceKind::Trace => "opentelemetry.proto.collector.trace.v1.TraceService",
            ServiceKind::Metrics => "opentelemetry.proto.collector.metrics.v1.MetricsService",
        }
    }

    /// Path the HTTP/JSON gateway serves this kind on.
    pub fn gateway_path(self) -> &'static str {
        match self {
            ServiceKind::Trace => "/v1/traces",
            ServiceKind::Metrics => "/v1/metrics",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_service_config(kind: ServiceKind, config: &ServiceConfig) -> Result<(), ReceiverError> {
    let problems = service_problems(config);
    if problems.is_empty() {
        return Ok(());
    }
    let reason = problems
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(ReceiverError::Registration { kind, reason })
}

fn sink_status(kind: ServiceKind, err: &SinkError) -> Status {
    match err {
        SinkError::Rejected(reason) => {
            Status::unavailable(format!("{kind} batch rejected: {reason}"))
        }
        SinkError::Internal(reason) => Status::internal(format!("{kind} sink failed: {reason}")),
    }
}
