//! The shared TCP listener and the virtual listeners derived from it.
//!
//! # Responsibilities
//! - Bind the one real listener (exactly once, at construction)
//! - Expose per-protocol virtual listeners fed by the demultiplexer

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::error::{ReceiverError, ServeError};
use crate::net::connection::SniffedStream;
use crate::net::sniff::Protocol;

/// Bind the receiver's listener.
pub async fn bind(address: &str) -> Result<TcpListener, ReceiverError> {
    let bind_error = |source| ReceiverError::Bind {
        address: address.to_string(),
        source,
    };

    let listener = TcpListener::bind(address).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// A listener that yields only the connections classified as one protocol.
///
/// Accepting fails once the owning demultiplexer is gone.
#[derive(Debug)]
pub struct VirtualListener {
    protocol: Protocol,
    incoming: mpsc::Receiver<SniffedStream>,
}

impl VirtualListener {
    pub(crate) fn new(protocol: Protocol, incoming: mpsc::Receiver<SniffedStream>) -> Self {
        Self { protocol, incoming }
    }

    /// Wait for the next connection routed to this listener.
    pub async fn accept(&mut self) -> Result<SniffedStream, ServeError> {
        self.incoming
            .recv()
            .await
            .ok_or(ServeError::ListenerClosed(self.protocol.as_str()))
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}
