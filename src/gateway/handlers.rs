//! JSON handlers that tunnel to the gRPC services.
//!
//! Each handler decodes the protobuf JSON body, forwards it over the loopback
//! channel and returns the gRPC response as JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::Json;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::transport::Channel;
use tonic::Request;

use crate::gateway::status::GatewayError;

/// Header prefix forwarded to the RPC side as metadata.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

pub async fn export_traces(
    State(mut client): State<TraceServiceClient<Channel>>,
    headers: HeaderMap,
    body: Result<Json<ExportTraceServiceRequest>, JsonRejection>,
) -> Result<Json<ExportTraceServiceResponse>, GatewayError> {
    let Json(batch) =
        body.map_err(|rejection| GatewayError::invalid_argument(rejection.body_text()))?;
    let response = client.export(outgoing(batch, &headers)).await?;
    Ok(Json(response.into_inner()))
}

pub async fn export_metrics(
    State(mut client): State<MetricsServiceClient<Channel>>,
    headers: HeaderMap,
    body: Result<Json<ExportMetricsServiceRequest>, JsonRejection>,
) -> Result<Json<ExportMetricsServiceResponse>, GatewayError> {
    let Json(batch) =
        body.map_err(|rejection| GatewayError::invalid_argument(rejection.body_text()))?;
    let response = client.export(outgoing(batch, &headers)).await?;
    Ok(Json(response.into_inner()))
}

pub async fn not_found(method: Method, uri: Uri) -> GatewayError {
    GatewayError::not_found(format!("no route for {method} {}", uri.path()))
}

/// Build the gRPC request, copying `grpc-metadata-*` headers.
fn outgoing<T>(message: T, headers: &HeaderMap) -> Request<T> {
    let mut request = Request::new(message);
    for (name, value) in headers {
        let Some(key) = name.as_str().strip_prefix(METADATA_HEADER_PREFIX) else {
            continue;
        };
        let (Ok(key), Ok(value)) = (
            MetadataKey::<Ascii>::from_bytes(key.as_bytes()),
            MetadataValue::<Ascii>::try_from(value.as_bytes()),
        ) else {
            tracing::debug!(
                header = %name,
                "Skipping metadata header that is not valid ASCII metadata"
            );
            continue;
        };
        request.metadata_mut().append(key, value);
    }
    request
}
