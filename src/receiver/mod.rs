//! The receiver lifecycle manager.
//!
//! # Data Flow
//! ```text
//! Receiver::new        → bind the shared listener (once, here)
//! register_*           → registrar.rs → RpcServer service table
//! start                → bootstrap.rs (wire gateway, demux, serve loops)
//!                      → StartupProbe decides the outcome
//! stop                 → abort RPC loop, gateway loop, listener; await them
//! ```
//!
//! # Design Decisions
//! - Every mutation of shared state happens under one `parking_lot` lock
//! - Background loops are supervised only during the startup window
//! - Stop is abrupt: tasks are aborted, connections dropped

mod bootstrap;
mod registrar;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

use crate::config::{validate_shared_options, GatewayConfig, ReceiverOptions};
use crate::error::ReceiverError;
use crate::gateway::GatewayServer;
use crate::lifecycle::{LifecycleState, OnceGuard, Outcome, StartupProbe, Transition};
use crate::net::listener;
use crate::rpc::{RpcServer, ServiceKind};
use crate::sink::{MetricsSink, TraceSink};

/// Receives traces and metrics over gRPC and HTTP/JSON on one address.
///
/// Cloning yields another handle to the same receiver.
#[derive(Clone)]
pub struct Receiver {
    inner: Arc<Shared>,
}

struct Shared {
    local_addr: SocketAddr,
    options: ReceiverOptions,
    probe: StartupProbe,
    trace_once: OnceGuard,
    metrics_once: OnceGuard,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    lifecycle: LifecycleState,
    /// Present until the demultiplexer takes it, or stop drops it.
    listener: Option<TcpListener>,
    rpc: Option<Arc<RpcServer>>,
    gateway: Option<Arc<GatewayServer>>,
    /// Registered kinds, in registration order.
    kinds: Vec<ServiceKind>,
    /// Loopback channel the gateway dials; set once wiring ran.
    gateway_channel: Option<Channel>,
    tasks: Tasks,
    #[cfg(test)]
    constructed: Constructed,
}

/// Background tasks, in the order stop tears them down.
#[derive(Default)]
struct Tasks {
    rpc: Option<JoinHandle<()>>,
    gateway: Option<JoinHandle<()>>,
    /// Owns the demultiplexer and with it the real listener.
    bootstrap: Option<JoinHandle<()>>,
}

impl Tasks {
    fn drain(&mut self) -> Vec<JoinHandle<()>> {
        [self.rpc.take(), self.gateway.take(), self.bootstrap.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Constructed {
    rpc: usize,
    gateway: usize,
}

impl State {
    fn rpc_server(&mut self) -> Arc<RpcServer> {
        if let Some(rpc) = &self.rpc {
            return rpc.clone();
        }
        #[cfg(test)]
        {
            self.constructed.rpc += 1;
        }
        self.rpc.insert(Arc::new(RpcServer::new())).clone()
    }

    fn gateway_server(&mut self, config: &GatewayConfig) -> Arc<GatewayServer> {
        if let Some(gateway) = &self.gateway {
            return gateway.clone();
        }
        #[cfg(test)]
        {
            self.constructed.gateway += 1;
        }
        self.gateway.insert(Arc::new(GatewayServer::new(config.clone()))).clone()
    }
}

impl Receiver {
    /// Bind `address` and build an idle receiver.
    ///
    /// Nothing is spawned until a start call. The listener, startup and
    /// gateway options are validated before anything is bound.
    pub async fn new(address: &str, options: ReceiverOptions) -> Result<Self, ReceiverError> {
        validate_shared_options(&options).map_err(ReceiverError::InvalidOptions)?;
        let listener = listener::bind(address).await?;
        let local_addr = listener.local_addr().map_err(|source| ReceiverError::Bind {
            address: address.to_string(),
            source,
        })?;
        let probe = StartupProbe::new(Duration::from_millis(options.startup.probe_timeout_ms));

        Ok(Self {
            inner: Arc::new(Shared {
                local_addr,
                options,
                probe,
                trace_once: OnceGuard::new(),
                metrics_once: OnceGuard::new(),
                state: Mutex::new(State {
                    listener: Some(listener),
                    ..State::default()
                }),
            }),
        })
    }

    /// Register both services and start serving.
    ///
    /// Returns [`Outcome::AlreadyDone`] if the servers were already started
    /// by an earlier call.
    pub async fn start(
        &self,
        trace_sink: Arc<dyn TraceSink>,
        metrics_sink: Arc<dyn MetricsSink>,
    ) -> Result<Outcome, ReceiverError> {
        self.ensure_not_stopped()?;
        let _ = self.inner.register_trace(trace_sink)?;
        let _ = self.inner.register_metrics(metrics_sink)?;
        self.start_servers().await
    }

    /// Register the trace service and start serving.
    ///
    /// If the servers are already running the service is added to them.
    pub async fn start_trace_reception(
        &self,
        sink: Arc<dyn TraceSink>,
    ) -> Result<Outcome, ReceiverError> {
        self.ensure_not_stopped()?;
        let _ = self.inner.register_trace(sink)?;
        self.start_servers().await
    }

    /// Register the metrics service and start serving.
    ///
    /// If the servers are already running the service is added to them.
    pub async fn start_metrics_reception(
        &self,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Outcome, ReceiverError> {
        self.ensure_not_stopped()?;
        let _ = self.inner.register_metrics(sink)?;
        self.start_servers().await
    }

    /// Stop both servers and release the listener.
    ///
    /// Stopping is abrupt and final. The listener is closed by the time the
    /// first call returns; a second call returns [`Outcome::AlreadyDone`]
    /// without waiting.
    pub async fn stop(&self) -> Result<Outcome, ReceiverError> {
        let tasks = {
            let mut state = self.inner.state.lock();
            if state.lifecycle.stop() == Transition::AlreadyDone {
                return Ok(Outcome::AlreadyDone);
            }

            let tasks = state.tasks.drain();
            for task in &tasks {
                task.abort();
            }
            drop(state.listener.take());
            state.gateway_channel = None;
            state.gateway = None;
            tasks
        };

        // An aborted task drops its future, and everything it owns, before
        // its handle resolves.
        for task in tasks {
            let _ = task.await;
        }

        tracing::info!(address = %self.inner.local_addr, "Receiver stopped");
        Ok(Outcome::Done)
    }

    /// Accepted for interface symmetry; does nothing.
    ///
    /// The RPC server cannot drop a single service while serving, so trace
    /// reception only ends with [`Receiver::stop`].
    pub fn stop_trace_reception(&self) -> Result<(), ReceiverError> {
        Ok(())
    }

    /// Accepted for interface symmetry; does nothing. See
    /// [`Receiver::stop_trace_reception`].
    pub fn stop_metrics_reception(&self) -> Result<(), ReceiverError> {
        Ok(())
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    /// Names of the services in the RPC server's table.
    pub fn rpc_service_names(&self) -> Vec<&'static str> {
        let state = self.inner.state.lock();
        state.rpc.as_ref().map(|rpc| rpc.service_names()).unwrap_or_default()
    }

    /// Paths currently wired into the gateway.
    pub fn gateway_routes(&self) -> Vec<&'static str> {
        let state = self.inner.state.lock();
        state
            .gateway
            .as_ref()
            .map(|gateway| gateway.wired().into_iter().map(ServiceKind::gateway_path).collect())
            .unwrap_or_default()
    }

    fn ensure_not_stopped(&self) -> Result<(), ReceiverError> {
        if self.inner.state.lock().lifecycle.is_stopped() {
            return Err(ReceiverError::AlreadyStopped);
        }
        Ok(())
    }

    async fn start_servers(&self) -> Result<Outcome, ReceiverError> {
        let (reporter, errors) = StartupProbe::channel();
        {
            let mut state = self.inner.state.lock();
            match state.lifecycle.begin_start() {
                Transition::Proceed => {}
                Transition::AlreadyDone => return Ok(Outcome::AlreadyDone),
                Transition::Rejected => return Err(ReceiverError::AlreadyStopped),
            }
            tracing::info!(
                address = %self.inner.local_addr,
                services = ?state.kinds,
                "Starting receiver"
            );
            let bootstrap = tokio::spawn(bootstrap::run(self.inner.clone(), reporter));
            state.tasks.bootstrap = Some(bootstrap);
        }

        let probed = self.inner.probe.wait(errors).await;

        if self.inner.state.lock().lifecycle.finish_start() == Transition::Rejected {
            tracing::warn!("Receiver stopped while starting");
            return Err(ReceiverError::AlreadyStopped);
        }
        match probed {
            Ok(()) => {
                tracing::info!(address = %self.inner.local_addr, "Receiver started");
                Ok(Outcome::Done)
            }
            Err(e) => {
                tracing::error!(
                    address = %self.inner.local_addr,
                    error = %e,
                    "Receiver failed to start"
                );
                Err(ReceiverError::StartupProbe(e))
            }
        }
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("local_addr", &self.inner.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for task in self.state.get_mut().tasks.drain() {
            task.abort();
        }
    }
}
