//! Start/stop idempotency and registration guarantees.

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use serde_json::json;
use telemetry_receiver::{
    LifecycleState, Outcome, Receiver, ReceiverError, ReceiverOptions, ServiceKind,
};
use tokio::net::TcpStream;
use tonic::transport::Endpoint;

mod common;

use common::RecordingSink;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_register_once() {
    let receiver = common::bind_receiver().await;
    let sink = RecordingSink::new();

    let mut starts = Vec::new();
    for _ in 0..8 {
        let receiver = receiver.clone();
        let sink = sink.clone();
        starts.push(tokio::spawn(async move { receiver.start(sink.clone(), sink).await }));
    }

    let mut done = 0;
    for start in starts {
        match start.await.unwrap().unwrap() {
            Outcome::Done => done += 1,
            Outcome::AlreadyDone => {}
        }
    }
    assert_eq!(done, 1);
    assert_eq!(
        receiver.rpc_service_names(),
        vec![ServiceKind::Trace.service_name(), ServiceKind::Metrics.service_name()]
    );
    assert_eq!(receiver.gateway_routes(), vec!["/v1/traces", "/v1/metrics"]);

    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn start_succeeds_within_probe_window() {
    let mut options = ReceiverOptions::default();
    options.startup.probe_timeout_ms = 1_000;
    let receiver = Receiver::new("127.0.0.1:0", options).await.unwrap();
    let sink = RecordingSink::new();

    let started = Instant::now();
    let outcome = receiver.start(sink.clone(), sink).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, Outcome::Done);
    assert!(elapsed >= Duration::from_millis(1_000));
    assert!(elapsed < Duration::from_millis(2_000));
    assert_eq!(receiver.state(), LifecycleState::Running);
    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn stop_before_start_does_not_block() {
    let receiver = common::bind_receiver().await;

    let outcome = tokio::time::timeout(Duration::from_millis(100), receiver.stop())
        .await
        .expect("stop returned promptly")
        .unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(receiver.state(), LifecycleState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_stops_close_once() {
    let receiver = common::bind_receiver().await;
    let sink = RecordingSink::new();
    let _ = receiver.start(sink.clone(), sink).await.unwrap();

    let first = {
        let receiver = receiver.clone();
        tokio::spawn(async move { receiver.stop().await })
    };
    let second = {
        let receiver = receiver.clone();
        tokio::spawn(async move { receiver.stop().await })
    };
    let mut outcomes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    outcomes.sort_by_key(|outcome| outcome.is_done());

    assert_eq!(outcomes, vec![Outcome::AlreadyDone, Outcome::Done]);
}

#[tokio::test]
async fn stop_releases_the_port_before_returning() {
    let receiver = common::bind_receiver().await;
    let addr = receiver.local_addr().to_string();
    let sink = RecordingSink::new();
    let _ = receiver.start(sink.clone(), sink).await.unwrap();
    assert!(TcpStream::connect(&addr).await.is_ok());

    let _ = receiver.stop().await.unwrap();

    assert!(TcpStream::connect(&addr).await.is_err());
    let rebound = Receiver::new(&addr, common::fast_options()).await.unwrap();
    assert_eq!(rebound.local_addr().to_string(), addr);
}

#[tokio::test]
async fn invalid_options_bind_nothing() {
    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = holder.local_addr().unwrap().to_string();
    drop(holder);

    let mut options = common::fast_options();
    options.demux.max_sniff_bytes = 24;
    options.gateway.request_timeout_secs = 0;
    let err = Receiver::new(&addr, options).await.unwrap_err();
    match err {
        ReceiverError::InvalidOptions(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected invalid options, got {other}"),
    }

    assert!(Receiver::new(&addr, common::fast_options()).await.is_ok());
}

#[tokio::test]
async fn address_in_use_is_a_bind_error() {
    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = holder.local_addr().unwrap().to_string();

    let err = Receiver::new(&addr, common::fast_options()).await.unwrap_err();
    match err {
        ReceiverError::Bind { address, .. } => assert_eq!(address, addr),
        other => panic!("expected bind error, got {other}"),
    }
}

#[tokio::test]
async fn restart_after_stop_is_rejected() {
    let receiver = common::bind_receiver().await;
    let sink = RecordingSink::new();
    let _ = receiver.start(sink.clone(), sink.clone()).await.unwrap();
    let _ = receiver.stop().await.unwrap();

    let err = receiver.start_trace_reception(sink).await.unwrap_err();
    assert!(matches!(err, ReceiverError::AlreadyStopped));
}

#[tokio::test]
async fn late_registration_serves_on_open_connections() {
    let receiver = common::bind_receiver().await;
    let addr = receiver.local_addr();
    let sink = RecordingSink::new();
    assert_eq!(receiver.start_trace_reception(sink.clone()).await.unwrap(), Outcome::Done);
    assert_eq!(receiver.gateway_routes(), vec!["/v1/traces"]);

    // Both connections are opened while only traces are registered.
    let channel = Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let http = reqwest::Client::builder().no_proxy().build().unwrap();

    TraceServiceClient::new(channel.clone())
        .export(common::sample_trace_batch())
        .await
        .unwrap();
    let response = http
        .post(format!("http://{addr}/v1/traces"))
        .json(&common::sample_trace_json())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let status = MetricsServiceClient::new(channel.clone())
        .export(ExportMetricsServiceRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);
    let response = http
        .post(format!("http://{addr}/v1/metrics"))
        .json(&json!({ "resourceMetrics": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    assert_eq!(receiver.start_metrics_reception(sink.clone()).await.unwrap(), Outcome::AlreadyDone);
    assert_eq!(
        receiver.rpc_service_names(),
        vec![ServiceKind::Trace.service_name(), ServiceKind::Metrics.service_name()]
    );
    assert_eq!(receiver.gateway_routes(), vec!["/v1/traces", "/v1/metrics"]);

    MetricsServiceClient::new(channel)
        .export(ExportMetricsServiceRequest::default())
        .await
        .unwrap();
    let response = http
        .post(format!("http://{addr}/v1/metrics"))
        .json(&json!({ "resourceMetrics": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    assert_eq!(sink.trace_batches(), vec![common::sample_trace_batch(); 2]);
    assert_eq!(sink.metric_batches(), vec![ExportMetricsServiceRequest::default(); 2]);
    let _ = receiver.stop().await.unwrap();
}

#[tokio::test]
async fn registration_error_halts_start() {
    let mut options = common::fast_options();
    options.metrics.max_recv_msg_size_bytes = 0;
    let receiver = Receiver::new("127.0.0.1:0", options).await.unwrap();
    let sink = RecordingSink::new();

    let err = receiver.start(sink.clone(), sink).await.unwrap_err();
    assert!(matches!(
        err,
        ReceiverError::Registration {
            kind: ServiceKind::Metrics,
            ..
        }
    ));
    assert_eq!(receiver.state(), LifecycleState::NotStarted);
    assert_eq!(receiver.rpc_service_names(), vec![ServiceKind::Trace.service_name()]);
}
