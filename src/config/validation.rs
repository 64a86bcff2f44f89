//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Validate addresses and header values before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReceiverConfig → Result<(), Vec<ValidationError>>
//! - `Receiver::new` checks only the shared sections; a bad service section
//!   fails that kind's registration instead

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ReceiverConfig, ReceiverOptions, ServiceConfig};
use crate::net::sniff::MIN_SNIFF_BYTES;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Render a list of problems as one line.
pub fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Validate a full configuration.
pub fn validate_config(config: &ReceiverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "bind_address",
            format!("{:?} is not a socket address", config.bind_address),
        ));
    }

    check_options(&config.receiver, &mut errors);

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "text" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected \"text\" or \"json\", got {:?}", observability.log_format),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the sections every service kind depends on.
///
/// The per-kind sections are left to registration, which reports them as a
/// registration failure of that kind alone.
pub fn validate_shared_options(options: &ReceiverOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_shared(options, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_options(options: &ReceiverOptions, errors: &mut Vec<ValidationError>) {
    check_shared(options, errors);
    check_service("receiver.trace", &options.trace, errors);
    check_service("receiver.metrics", &options.metrics, errors);
}

fn check_shared(options: &ReceiverOptions, errors: &mut Vec<ValidationError>) {
    if options.startup.probe_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "receiver.startup.probe_timeout_ms",
            "must be greater than 0",
        ));
    }

    let demux = &options.demux;
    if demux.sniff_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "receiver.demux.sniff_timeout_ms",
            "must be greater than 0",
        ));
    }
    if demux.max_sniff_bytes < MIN_SNIFF_BYTES {
        errors.push(ValidationError::new(
            "receiver.demux.max_sniff_bytes",
            format!("must be at least {MIN_SNIFF_BYTES}"),
        ));
    }
    if demux.backlog == 0 {
        errors.push(ValidationError::new("receiver.demux.backlog", "must be greater than 0"));
    }

    for origin in &options.gateway.cors_allowed_origins {
        if origin != "*" && axum::http::HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "receiver.gateway.cors_allowed_origins",
                format!("{origin:?} is not a valid origin"),
            ));
        }
    }
    if options.gateway.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "receiver.gateway.max_body_bytes",
            "must be greater than 0",
        ));
    }
    if options.gateway.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "receiver.gateway.request_timeout_secs",
            "must be greater than 0",
        ));
    }
}

/// Problems with one service kind's settings.
pub fn service_problems(service: &ServiceConfig) -> Vec<(&'static str, &'static str)> {
    let mut problems = Vec::new();
    if service.max_recv_msg_size_bytes == 0 {
        problems.push(("max_recv_msg_size_bytes", "must be greater than 0"));
    }
    if service.max_concurrent_exports == 0 {
        problems.push(("max_concurrent_exports", "must be greater than 0"));
    }
    problems
}

fn check_service(prefix: &str, service: &ServiceConfig, errors: &mut Vec<ValidationError>) {
    for (field, message) in service_problems(service) {
        errors.push(ValidationError::new(format!("{prefix}.{field}"), message));
    }
}
