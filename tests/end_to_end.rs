//! gRPC and HTTP/JSON exports against one running receiver.

use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use serde_json::json;

use telemetry_receiver::{Outcome, Receiver};

mod common;

use common::RecordingSink;

fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn running() -> (Receiver, std::sync::Arc<RecordingSink>) {
    let receiver = common::bind_receiver().await;
    let sink = RecordingSink::new();
    let outcome = receiver.start(sink.clone(), sink.clone()).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    (receiver, sink)
}

#[tokio::test]
async fn grpc_and_json_reach_the_same_sink() {
    let (receiver, sink) = running().await;
    let addr = receiver.local_addr();

    let mut client = TraceServiceClient::connect(format!("http://{addr}")).await.unwrap();
    client.export(common::sample_trace_batch()).await.unwrap();
    assert_eq!(sink.trace_batches().len(), 1);

    let response = http_client()
        .post(format!("http://{addr}/v1/traces"))
        .json(&common::sample_trace_json())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let batches = sink.trace_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], batches[1]);
    assert_eq!(batches[0], common::sample_trace_batch());

    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn empty_batches_are_accepted_over_both_protocols() {
    let (receiver, sink) = running().await;
    let addr = receiver.local_addr();

    let mut client = TraceServiceClient::connect(format!("http://{addr}")).await.unwrap();
    client.export(ExportTraceServiceRequest::default()).await.unwrap();
    let response = http_client()
        .post(format!("http://{addr}/v1/traces"))
        .json(&json!({ "resourceSpans": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    assert_eq!(sink.trace_batches(), vec![ExportTraceServiceRequest::default(); 2]);
    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn metrics_over_both_protocols() {
    let (receiver, sink) = running().await;
    let addr = receiver.local_addr();

    let mut client = MetricsServiceClient::connect(format!("http://{addr}")).await.unwrap();
    client.export(ExportMetricsServiceRequest::default()).await.unwrap();

    let response = http_client()
        .post(format!("http://{addr}/v1/metrics"))
        .header("grpc-metadata-tenant", "acme")
        .json(&json!({ "resourceMetrics": [] }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    assert_eq!(sink.metric_batches(), vec![ExportMetricsServiceRequest::default(); 2]);
    assert!(sink.trace_batches().is_empty());
    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn gateway_errors_are_json() {
    let (receiver, sink) = running().await;
    let addr = receiver.local_addr();
    let client = http_client();

    let missing = client
        .post(format!("http://{addr}/v1/logs"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["code"], 5);

    let malformed = client
        .post(format!("http://{addr}/v1/traces"))
        .header("content-type", "application/json")
        .body("{\"resourceSpans\": [")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = malformed.json().await.unwrap();
    assert_eq!(body["code"], 3);

    assert!(sink.trace_batches().is_empty());
    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn stopped_receiver_refuses_exports() {
    let (receiver, sink) = running().await;
    let addr = receiver.local_addr();
    let _ = receiver.stop().await.unwrap();

    assert!(TraceServiceClient::connect(format!("http://{addr}")).await.is_err());
    assert!(sink.trace_batches().is_empty());
}
