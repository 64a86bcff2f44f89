//! Connection demultiplexer.
//!
//! # Data Flow
//! ```text
//! TcpListener::accept
//!     → spawn classify task (sniff.rs, bounded by timeout and byte budget)
//!     → SniffedStream (buffered prefix + socket)
//!     → rpc VirtualListener      (HTTP/2 + application/grpc)
//!     → gateway VirtualListener  (everything else)
//! ```
//!
//! Dropping the demultiplexer closes the real listener and both virtual
//! listeners, and aborts classifications in flight.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::DemuxConfig;
use crate::error::ServeError;
use crate::net::connection::{ConnectionId, SniffedStream};
use crate::net::listener::VirtualListener;
use crate::net::sniff::{self, Protocol};
use crate::observability::metrics;

/// Owns the real listener and fans its connections out by protocol.
pub struct Demultiplexer {
    listener: TcpListener,
    router: ConnectionRouter,
    classifying: JoinSet<()>,
}

#[derive(Clone)]
struct ConnectionRouter {
    rpc: mpsc::Sender<SniffedStream>,
    gateway: mpsc::Sender<SniffedStream>,
    max_sniff_bytes: usize,
    sniff_timeout: Duration,
}

impl Demultiplexer {
    /// Split `listener` into an RPC and a gateway listener.
    pub fn new(
        listener: TcpListener,
        config: &DemuxConfig,
    ) -> (Self, VirtualListener, VirtualListener) {
        let backlog = config.backlog.max(1);
        let (rpc_tx, rpc_rx) = mpsc::channel(backlog);
        let (gateway_tx, gateway_rx) = mpsc::channel(backlog);

        let demux = Self {
            listener,
            router: ConnectionRouter {
                rpc: rpc_tx,
                gateway: gateway_tx,
                max_sniff_bytes: config.max_sniff_bytes,
                sniff_timeout: Duration::from_millis(config.sniff_timeout_ms),
            },
            classifying: JoinSet::new(),
        };

        (
            demux,
            VirtualListener::new(Protocol::Rpc, rpc_rx),
            VirtualListener::new(Protocol::Gateway, gateway_rx),
        )
    }

    /// Run the shared accept loop until the listener fails.
    ///
    /// Accept errors are terminal; returning drops both virtual listeners'
    /// senders so the servers behind them stop too.
    pub async fn serve(mut self) -> ServeError {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Demultiplexer accept failed");
                            return ServeError::Accept(e);
                        }
                    };
                    let router = self.router.clone();
                    self.classifying.spawn(router.route(stream, peer_addr));
                }
                Some(_) = self.classifying.join_next(), if !self.classifying.is_empty() => {}
            }
        }
    }
}

impl ConnectionRouter {
    async fn route(self, mut stream: TcpStream, peer_addr: SocketAddr) {
        let id = ConnectionId::new();
        let mut prefix = BytesMut::new();
        let protocol =
            sniff::sniff(&mut stream, &mut prefix, self.max_sniff_bytes, self.sniff_timeout).await;

        tracing::debug!(
            connection_id = %id,
            peer_addr = %peer_addr,
            protocol = %protocol,
            sniffed_bytes = prefix.len(),
            "Connection classified"
        );
        metrics::record_connection(protocol);

        let target = match protocol {
            Protocol::Rpc => &self.rpc,
            Protocol::Gateway => &self.gateway,
        };
        let conn = SniffedStream::new(id, peer_addr, prefix.freeze(), stream);
        if target.send(conn).await.is_err() {
            tracing::warn!(
                connection_id = %id,
                protocol = %protocol,
                "No server accepting, dropping connection"
            );
        }
    }
}
