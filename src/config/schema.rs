//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the receiver.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the receiver process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Address of the shared RPC + gateway listener (e.g., "0.0.0.0:55678").
    pub bind_address: String,

    /// Options handed to the receiver itself.
    pub receiver: ReceiverOptions,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:55678".to_string(),
            receiver: ReceiverOptions::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Options accepted by [`Receiver::new`](crate::Receiver::new).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReceiverOptions {
    /// Connection classification settings.
    pub demux: DemuxConfig,

    /// Startup probe settings.
    pub startup: StartupConfig,

    /// Trace service settings.
    pub trace: ServiceConfig,

    /// Metrics service settings.
    pub metrics: ServiceConfig,

    /// HTTP/JSON gateway settings.
    pub gateway: GatewayConfig,
}

/// Connection demultiplexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Maximum time spent classifying a new connection, in milliseconds.
    pub sniff_timeout_ms: u64,

    /// Maximum bytes buffered while classifying.
    pub max_sniff_bytes: usize,

    /// Classified connections queued per server before the demultiplexer waits.
    pub backlog: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            sniff_timeout_ms: 10_000,
            max_sniff_bytes: 64 * 1024,
            backlog: 128,
        }
    }
}

/// Startup probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// How long `start` waits for an early failure before assuming success.
    pub probe_timeout_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self { probe_timeout_ms: 1_000 }
    }
}

/// Per-service-kind configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Largest accepted gRPC message, in bytes.
    pub max_recv_msg_size_bytes: usize,

    /// Exports handed to the sink concurrently.
    pub max_concurrent_exports: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_recv_msg_size_bytes: 4 * 1024 * 1024,
            max_concurrent_exports: 64,
        }
    }
}

/// HTTP/JSON gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Origins allowed by CORS; empty disables CORS, "*" allows any.
    pub cors_allowed_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: Vec::new(),
            max_body_bytes: 4 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("text" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
