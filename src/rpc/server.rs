//! Registry of gRPC services served on the RPC virtual listener.

use std::convert::Infallible;

use bytes::Bytes;
use hyper::body::Body;
use hyper::Request;
use parking_lot::Mutex;
use tonic::body::BoxBody;
use tonic::server::NamedService;
use tonic::service::Routes;
use tower::util::Oneshot;
use tower::ServiceExt;

use crate::net::serve::BoxError;

/// The gRPC server's service table.
///
/// Services may be added while connections are being served. Every request
/// is routed through the table as it stands when the request arrives.
#[derive(Default)]
pub struct RpcServer {
    table: Mutex<ServiceTable>,
}

/// Empty `Routes` answer every call with `Unimplemented`.
#[derive(Default)]
struct ServiceTable {
    names: Vec<&'static str>,
    routes: Routes,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service under its protocol name.
    ///
    /// Returns `false` and leaves the table untouched if a service with the
    /// same name is already present.
    pub fn add_service<S>(&self, service: S) -> bool
    where
        S: tower::Service<
                http::Request<BoxBody>,
                Response = http::Response<BoxBody>,
                Error = Infallible,
            > + NamedService
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        let mut table = self.table.lock();
        if table.names.contains(&S::NAME) {
            return false;
        }
        table.names.push(S::NAME);
        table.routes = std::mem::take(&mut table.routes).add_service(service);
        tracing::debug!(service = S::NAME, "Registered gRPC service");
        true
    }

    /// Route one request through the services registered right now.
    pub fn dispatch<B>(&self, request: Request<B>) -> Oneshot<Routes, Request<BoxBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let routes = self.table.lock().routes.clone();
        routes.oneshot(request.map(tonic::body::boxed))
    }

    pub fn service_names(&self) -> Vec<&'static str> {
        self.table.lock().names.clone()
    }
}
