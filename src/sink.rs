//! Downstream consumers of received telemetry.
//!
//! The receiver decodes export requests and hands them to a sink. Sinks are
//! shared between connections, so they are `Send + Sync` and held as
//! `Arc<dyn TraceSink>` / `Arc<dyn MetricsSink>`.

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

use crate::error::SinkError;

/// Consumer of trace export batches.
#[async_trait]
pub trait TraceSink: Send + Sync + 'static {
    async fn consume_traces(&self, batch: ExportTraceServiceRequest) -> Result<(), SinkError>;
}

/// Consumer of metrics export batches.
#[async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    async fn consume_metrics(&self, batch: ExportMetricsServiceRequest) -> Result<(), SinkError>;
}

/// Number of spans carried by a trace batch.
pub fn span_count(batch: &ExportTraceServiceRequest) -> usize {
    batch
        .resource_spans
        .iter()
        .flat_map(|resource| &resource.scope_spans)
        .map(|scope| scope.spans.len())
        .sum()
}

/// Number of metrics carried by a metrics batch.
pub fn metric_count(batch: &ExportMetricsServiceRequest) -> usize {
    batch
        .resource_metrics
        .iter()
        .flat_map(|resource| &resource.scope_metrics)
        .map(|scope| scope.metrics.len())
        .sum()
}

/// Sink that logs what it receives and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl TraceSink for LoggingSink {
    async fn consume_traces(&self, batch: ExportTraceServiceRequest) -> Result<(), SinkError> {
        tracing::info!(
            resources = batch.resource_spans.len(),
            spans = span_count(&batch),
            "Received trace batch"
        );
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for LoggingSink {
    async fn consume_metrics(&self, batch: ExportMetricsServiceRequest) -> Result<(), SinkError> {
        tracing::info!(
            resources = batch.resource_metrics.len(),
            metrics = metric_count(&batch),
            "Received metrics batch"
        );
        Ok(())
    }
}
