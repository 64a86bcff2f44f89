//! HTTP/JSON gateway router.
//!
//! # Responsibilities
//! - Hold the routes wired so far, one per service kind
//! - Wrap them in middleware (tracing, limits, timeout, CORS)
//! - Route each request through the router as wired at that moment

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, Request};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use hyper::body::Body;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use parking_lot::Mutex;
use tonic::transport::Channel;
use tower::util::Oneshot;
use tower::ServiceExt;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::gateway::handlers;
use crate::lifecycle::Outcome;
use crate::net::serve::BoxError;
use crate::rpc::ServiceKind;

/// The HTTP side of the receiver.
pub struct GatewayServer {
    config: GatewayConfig,
    table: Mutex<RouteTable>,
}

struct RouteTable {
    kinds: Vec<ServiceKind>,
    routes: Router,
    /// `routes` with middleware applied, rebuilt on every wiring.
    service: Router,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        let routes = Router::new();
        let service = layered(&config, routes.clone());
        Self {
            config,
            table: Mutex::new(RouteTable {
                kinds: Vec::new(),
                routes,
                service,
            }),
        }
    }

    /// Route `kind`'s JSON endpoint to the RPC server over `channel`.
    pub fn wire(&self, kind: ServiceKind, channel: Channel) -> Outcome {
        let mut table = self.table.lock();
        if table.kinds.contains(&kind) {
            return Outcome::AlreadyDone;
        }

        let route = match kind {
            ServiceKind::Trace => Router::new()
                .route(kind.gateway_path(), post(handlers::export_traces))
                .with_state(TraceServiceClient::new(channel)),
            ServiceKind::Metrics => Router::new()
                .route(kind.gateway_path(), post(handlers::export_metrics))
                .with_state(MetricsServiceClient::new(channel)),
        };
        let routes = std::mem::take(&mut table.routes).merge(route);
        table.service = layered(&self.config, routes.clone());
        table.routes = routes;
        table.kinds.push(kind);

        tracing::debug!(kind = %kind, path = kind.gateway_path(), "Wired gateway route");
        Outcome::Done
    }

    /// Handle one request with the routes wired right now.
    pub fn dispatch<B>(&self, request: Request<B>) -> Oneshot<Router, Request<B>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let router = self.table.lock().service.clone();
        router.oneshot(request)
    }

    pub fn wired(&self) -> Vec<ServiceKind> {
        self.table.lock().kinds.clone()
    }
}

/// Build the middleware stack around the wired routes.
#[allow(deprecated)]
fn layered(config: &GatewayConfig, routes: Router) -> Router {
    let router = routes
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

    let router = match cors_layer(&config.cors_allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers(Any),
    )
}
