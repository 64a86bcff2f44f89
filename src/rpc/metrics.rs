//! Metrics export service.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use tokio::sync::Semaphore;
use tonic::{Request, Response, Status};

use crate::config::ServiceConfig;
use crate::error::ReceiverError;
use crate::observability::metrics::{self, BatchOutcome};
use crate::rpc::{check_service_config, sink_status, ServiceKind};
use crate::sink::{metric_count, MetricsSink};

/// Receives metrics batches over gRPC and forwards them to a [`MetricsSink`].
pub struct MetricsReceiver {
    sink: Arc<dyn MetricsSink>,
    permits: Arc<Semaphore>,
    max_recv_msg_size: usize,
}

impl MetricsReceiver {
    pub fn new(sink: Arc<dyn MetricsSink>, config: &ServiceConfig) -> Result<Self, ReceiverError> {
        check_service_config(ServiceKind::Metrics, config)?;
        Ok(Self {
            sink,
            permits: Arc::new(Semaphore::new(config.max_concurrent_exports)),
            max_recv_msg_size: config.max_recv_msg_size_bytes,
        })
    }

    /// Wrap in the generated tonic server with the decoding limit applied.
    pub fn into_service(self) -> MetricsServiceServer<Self> {
        let limit = self.max_recv_msg_size;
        MetricsServiceServer::new(self).max_decoding_message_size(limit)
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let batch = request.into_inner();
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Status::unavailable("metrics receiver closed"))?;

        let started = Instant::now();
        let points = metric_count(&batch);
        match self.sink.consume_metrics(batch).await {
            Ok(()) => {
                metrics::record_items(ServiceKind::Metrics, points);
                metrics::record_batch(ServiceKind::Metrics, BatchOutcome::Accepted, started);
                Ok(Response::new(ExportMetricsServiceResponse::default()))
            }
            Err(e) => {
                metrics::record_batch(ServiceKind::Metrics, BatchOutcome::from(&e), started);
                tracing::warn!(metrics = points, error = %e, "Metrics sink refused batch");
                Err(sink_status(ServiceKind::Metrics, &e))
            }
        }
    }
}
