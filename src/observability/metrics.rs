//! Metrics collection and exposition.
//!
//! # Metrics
//! - `receiver_connections_total` (counter): accepted connections by protocol
//! - `receiver_export_batches_total` (counter): export calls by kind, outcome
//! - `receiver_export_items_total` (counter): spans or data points by kind
//! - `receiver_export_duration_seconds` (histogram): sink latency by kind
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the Prometheus recorder
//! - Labels are static strings to keep cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::SinkError;
use crate::net::Protocol;
use crate::rpc::ServiceKind;

/// Outcome label for an export batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Accepted,
    Rejected,
    Failed,
}

impl BatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchOutcome::Accepted => "accepted",
            BatchOutcome::Rejected => "rejected",
            BatchOutcome::Failed => "failed",
        }
    }
}

impl From<&SinkError> for BatchOutcome {
    fn from(err: &SinkError) -> Self {
        match err {
            SinkError::Rejected(_) => BatchOutcome::Rejected,
            SinkError::Internal(_) => BatchOutcome::Failed,
        }
    }
}

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

pub fn record_connection(protocol: Protocol) {
    metrics::counter!("receiver_connections_total", "protocol" => protocol.as_str()).increment(1);
}

/// Record one export call and how long the sink took with it.
pub fn record_batch(kind: ServiceKind, outcome: BatchOutcome, started: Instant) {
    metrics::counter!(
        "receiver_export_batches_total",
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!("receiver_export_duration_seconds", "kind" => kind.as_str())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_items(kind: ServiceKind, count: usize) {
    metrics::counter!("receiver_export_items_total", "kind" => kind.as_str())
        .increment(count as u64);
}
