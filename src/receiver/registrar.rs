//! Service registration.
//!
//! Each kind is registered at most once per receiver. Registering a kind
//! after the servers started adds it to the running RPC server and wires
//! its gateway route straight away.

use std::sync::Arc;

use crate::error::ReceiverError;
use crate::lifecycle::{OnceGuard, Outcome};
use crate::rpc::{MetricsReceiver, RpcServer, ServiceKind, TraceReceiver};
use crate::sink::{MetricsSink, TraceSink};

use super::Shared;

impl Shared {
    pub(super) fn register_trace(
        &self,
        sink: Arc<dyn TraceSink>,
    ) -> Result<Outcome, ReceiverError> {
        self.register(ServiceKind::Trace, &self.trace_once, |rpc| {
            let service = TraceReceiver::new(sink, &self.options.trace)?.into_service();
            Ok(rpc.add_service(service))
        })
    }

    pub(super) fn register_metrics(
        &self,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Outcome, ReceiverError> {
        self.register(ServiceKind::Metrics, &self.metrics_once, |rpc| {
            let service = MetricsReceiver::new(sink, &self.options.metrics)?.into_service();
            Ok(rpc.add_service(service))
        })
    }

    fn register<F>(
        &self,
        kind: ServiceKind,
        once: &OnceGuard,
        attach: F,
    ) -> Result<Outcome, ReceiverError>
    where
        F: FnOnce(&RpcServer) -> Result<bool, ReceiverError>,
    {
        let outcome = once.call(|| {
            let mut state = self.state.lock();
            if state.lifecycle.is_stopped() {
                return Err(ReceiverError::AlreadyStopped);
            }

            let rpc = state.rpc_server();
            if !attach(&rpc)? {
                return Ok(());
            }
            state.kinds.push(kind);

            if let (Some(gateway), Some(channel)) = (&state.gateway, &state.gateway_channel) {
                let _ = gateway.wire(kind, channel.clone());
            }
            Ok(())
        });

        match &outcome {
            Ok(Outcome::Done) => {
                tracing::info!(kind = %kind, service = kind.service_name(), "Service registered")
            }
            Ok(Outcome::AlreadyDone) => tracing::debug!(kind = %kind, "Service already registered"),
            Err(e) => tracing::error!(kind = %kind, error = %e, "Service registration failed"),
        }
        outcome
    }
}
