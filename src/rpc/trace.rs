//! Trace export service.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tokio::sync::Semaphore;
use tonic::{Request, Response, Status};

use crate::config::ServiceConfig;
use crate::error::ReceiverError;
use crate::observability::metrics::{self, BatchOutcome};
use crate::rpc::{check_service_config, sink_status, ServiceKind};
use crate::sink::{span_count, TraceSink};

/// Receives trace batches over gRPC and forwards them to a [`TraceSink`].
pub struct TraceReceiver {
    sink: Arc<dyn TraceSink>,
    permits: Arc<Semaphore>,
    max_recv_msg_size: usize,
}

impl TraceReceiver {
    pub fn new(sink: Arc<dyn TraceSink>, config: &ServiceConfig) -> Result<Self, ReceiverError> {
        check_service_config(ServiceKind::Trace, config)?;
        Ok(Self {
            sink,
            permits: Arc::new(Semaphore::new(config.max_concurrent_exports)),
            max_recv_msg_size: config.max_recv_msg_size_bytes,
        })
    }

    /// Wrap in the generated tonic server with the decoding limit applied.
    pub fn into_service(self) -> TraceServiceServer<Self> {
        let limit = self.max_recv_msg_size;
        TraceServiceServer::new(self).max_decoding_message_size(limit)
    }
}

#[tonic::async_trait]
impl TraceService for TraceReceiver {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let batch = request.into_inner();
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Status::unavailable("trace receiver closed"))?;

        let started = Instant::now();
        let spans = span_count(&batch);
        match self.sink.consume_traces(batch).await {
            Ok(()) => {
                metrics::record_items(ServiceKind::Trace, spans);
                metrics::record_batch(ServiceKind::Trace, BatchOutcome::Accepted, started);
                Ok(Response::new(ExportTraceServiceResponse::default()))
            }
            Err(e) => {
                metrics::record_batch(ServiceKind::Trace, BatchOutcome::from(&e), started);
                tracing::warn!(spans, error = %e, "Trace sink refused batch");
                Err(sink_status(ServiceKind::Trace, &e))
            }
        }
    }
}
