//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
use parking_lot::Mutex;
use serde_json::json;
use telemetry_receiver::net::sniff::HTTP2_PREFACE;
use telemetry_receiver::{MetricsSink, Receiver, ReceiverOptions, SinkError, TraceSink};

/// Sink that keeps every batch it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub traces: Mutex<Vec<ExportTraceServiceRequest>>,
    pub metrics: Mutex<Vec<ExportMetricsServiceRequest>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn trace_batches(&self) -> Vec<ExportTraceServiceRequest> {
        self.traces.lock().clone()
    }

    pub fn metric_batches(&self) -> Vec<ExportMetricsServiceRequest> {
        self.metrics.lock().clone()
    }
}

#[async_trait]
impl TraceSink for RecordingSink {
    async fn consume_traces(&self, batch: ExportTraceServiceRequest) -> Result<(), SinkError> {
        self.traces.lock().push(batch);
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn consume_metrics(&self, batch: ExportMetricsServiceRequest) -> Result<(), SinkError> {
        self.metrics.lock().push(batch);
        Ok(())
    }
}

const TRACE_ID: [u8; 16] = [
    0x5b, 0x8e, 0xff, 0xf7, 0x98, 0x03, 0x81, 0x03, 0xd2, 0x69, 0xb6, 0x33, 0x81, 0x3f, 0xc6, 0x0c,
];
const ROOT_SPAN_ID: [u8; 8] = [0xee, 0xe1, 0x9b, 0x7e, 0xc3, 0xc1, 0xb1, 0x74];
const CHILD_SPAN_ID: [u8; 8] = [0xee, 0xe1, 0x9b, 0x7e, 0xc3, 0xc1, 0xb1, 0x73];

/// A two-span trace as an SDK exporter would send it.
pub fn sample_trace_batch() -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans: vec![
                    Span {
                        trace_id: TRACE_ID.to_vec(),
                        span_id: ROOT_SPAN_ID.to_vec(),
                        name: "GET /cart".into(),
                        kind: 2,
                        start_time_unix_nano: 1_544_712_660_000_000_000,
                        end_time_unix_nano: 1_544_712_661_000_000_000,
                        ..Default::default()
                    },
                    Span {
                        trace_id: TRACE_ID.to_vec(),
                        span_id: CHILD_SPAN_ID.to_vec(),
                        parent_span_id: ROOT_SPAN_ID.to_vec(),
                        name: "SELECT items".into(),
                        kind: 3,
                        start_time_unix_nano: 1_544_712_660_300_000_000,
                        end_time_unix_nano: 1_544_712_660_600_000_000,
                        ..Default::default()
                    },
                ],
                schema_url: "https://opentelemetry.io/schemas/1.21.0".into(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// [`sample_trace_batch`] in OTLP/JSON: camelCase keys, hex ids, decimal
/// string timestamps.
pub fn sample_trace_json() -> serde_json::Value {
    json!({
        "resourceSpans": [{
            "scopeSpans": [{
                "schemaUrl": "https://opentelemetry.io/schemas/1.21.0",
                "spans": [
                    {
                        "traceId": "5b8efff798038103d269b633813fc60c",
                        "spanId": "eee19b7ec3c1b174",
                        "name": "GET /cart",
                        "kind": 2,
                        "startTimeUnixNano": "1544712660000000000",
                        "endTimeUnixNano": "1544712661000000000"
                    },
                    {
                        "traceId": "5b8efff798038103d269b633813fc60c",
                        "spanId": "eee19b7ec3c1b173",
                        "parentSpanId": "eee19b7ec3c1b174",
                        "name": "SELECT items",
                        "kind": 3,
                        "startTimeUnixNano": "1544712660300000000",
                        "endTimeUnixNano": "1544712660600000000"
                    }
                ]
            }]
        }]
    })
}

/// Options with a short startup window so tests stay fast.
pub fn fast_options() -> ReceiverOptions {
    let mut options = ReceiverOptions::default();
    options.startup.probe_timeout_ms = 200;
    options.demux.sniff_timeout_ms = 2_000;
    options
}

/// Bind a receiver on an ephemeral loopback port.
pub async fn bind_receiver() -> Receiver {
    Receiver::new("127.0.0.1:0", fast_options()).await.unwrap()
}

/// Encode one HTTP/2 frame.
pub fn frame(kind: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut out = vec![(len >> 16) as u8, (len >> 8) as u8, len as u8, kind, flags];
    out.extend_from_slice(&stream_id.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Client preface, empty SETTINGS and a HEADERS frame carrying `content_type`.
pub fn h2_request_prefix(path: &str, content_type: &str) -> Vec<u8> {
    let mut encoder = hpack::Encoder::new();
    let block = encoder.encode(vec![
        (&b":method"[..], &b"POST"[..]),
        (&b":scheme"[..], &b"http"[..]),
        (&b":path"[..], path.as_bytes()),
        (&b":authority"[..], &b"localhost"[..]),
        (&b"content-type"[..], content_type.as_bytes()),
    ]);

    let mut out = HTTP2_PREFACE.to_vec();
    out.extend(frame(0x4, 0, 0, &[]));
    out.extend(frame(0x1, 0x4, 1, &block));
    out
}

/// Retry `check` until it returns true or `within` elapses.
pub async fn eventually<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
