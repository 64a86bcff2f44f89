//! Background start sequence.
//!
//! # Startup Sequence
//! 1. Wire a gateway route for every registered kind over a loopback channel
//! 2. Split the listener with the demultiplexer
//! 3. Spawn the RPC and gateway serve loops
//! 4. Run the demultiplexer's accept loop
//!
//! Each step's terminal error goes to the startup probe's channel.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tonic::transport::{Channel, Endpoint};

use crate::error::ServeError;
use crate::lifecycle::probe::ErrorReporter;
use crate::net::serve::serve_connections;
use crate::net::Demultiplexer;

use super::Shared;

pub(super) async fn run(shared: Arc<Shared>, reporter: ErrorReporter) {
    let launched = launch(&shared, &reporter);
    // Serving must not keep the receiver alive.
    drop(shared);

    match launched {
        Ok(demux) => {
            let _ = reporter.send(demux.serve().await);
        }
        Err(e) => {
            tracing::error!(error = %e, "Receiver bootstrap failed");
            let _ = reporter.send(e);
        }
    }
}

fn launch(shared: &Shared, reporter: &ErrorReporter) -> Result<Demultiplexer, ServeError> {
    let mut state = shared.state.lock();
    if state.lifecycle.is_stopped() {
        return Err(ServeError::Aborted);
    }

    let channel = loopback_channel(shared.local_addr)?;
    let gateway = state.gateway_server(&shared.options.gateway);
    for kind in &state.kinds {
        let _ = gateway.wire(*kind, channel.clone());
    }
    state.gateway_channel = Some(channel);

    let listener = state.listener.take().ok_or(ServeError::ListenerUnavailable)?;
    let (demux, rpc_listener, gateway_listener) =
        Demultiplexer::new(listener, &shared.options.demux);

    let rpc = state.rpc_server();
    let rpc_loop = tokio::spawn(reported(
        serve_connections(rpc_listener, move |request| rpc.dispatch(request)),
        reporter.clone(),
    ));
    let gateway_loop = tokio::spawn(reported(
        serve_connections(gateway_listener, move |request| gateway.dispatch(request)),
        reporter.clone(),
    ));
    state.tasks.rpc = Some(rpc_loop);
    state.tasks.gateway = Some(gateway_loop);

    tracing::debug!(address = %shared.local_addr, "Serve loops launched");
    Ok(demux)
}

async fn reported<F>(serve: F, reporter: ErrorReporter)
where
    F: Future<Output = ServeError>,
{
    let _ = reporter.send(serve.await);
}

/// Lazy channel from the gateway to the RPC server on the same listener.
fn loopback_channel(local_addr: SocketAddr) -> Result<Channel, ServeError> {
    let target = loopback_target(local_addr);
    let endpoint = Endpoint::from_shared(format!("http://{target}")).map_err(|e| {
        ServeError::GatewayWiring(format!("invalid loopback endpoint {target}: {e}"))
    })?;
    Ok(endpoint.connect_lazy())
}

/// An unspecified bind address is dialed through loopback of the same family.
fn loopback_target(local_addr: SocketAddr) -> SocketAddr {
    let ip = match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local_addr.port())
}
