//! Per-connection serve loop shared by the RPC and gateway servers.

use std::future::Future;

use hyper::body::{Body, Incoming};
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::task::JoinSet;

use crate::error::ServeError;
use crate::net::listener::VirtualListener;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accept from `listener` and serve every request on every connection
/// through `handle`.
///
/// `handle` runs per request, not per connection, so a service registered
/// while a keep-alive connection is open is reachable on that connection.
///
/// Connections live in a [`JoinSet`] owned by this future: dropping or
/// aborting the loop closes every connection it accepted.
pub async fn serve_connections<H, Fut, B, E>(mut listener: VirtualListener, handle: H) -> ServeError
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<B>, E>> + Send + 'static,
    E: Into<BoxError>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let protocol = listener.protocol();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::error!(protocol = %protocol, error = %e, "Serve loop terminated");
                        return e;
                    }
                };
                let id = stream.id();
                let peer_addr = stream.peer_addr();
                let service = TowerToHyperService::new(tower::service_fn(handle.clone()));

                connections.spawn(async move {
                    let builder = auto::Builder::new(TokioExecutor::new());
                    let served = builder.serve_connection(TokioIo::new(stream), service).await;
                    if let Err(e) = served {
                        tracing::debug!(
                            connection_id = %id,
                            peer_addr = %peer_addr,
                            protocol = %protocol,
                            error = %e,
                            "Connection ended with error"
                        );
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}
