//! Dual-protocol telemetry receiver.
//!
//! One TCP listener serves trace and metrics exports over gRPC and over an
//! HTTP/JSON gateway that tunnels to the same gRPC services.

pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod receiver;
pub mod rpc;
pub mod sink;

pub use config::{ReceiverConfig, ReceiverOptions};
pub use error::{ReceiverError, ServeError, SinkError};
pub use lifecycle::{LifecycleState, Outcome};
pub use receiver::Receiver;
pub use rpc::ServiceKind;
pub use sink::{LoggingSink, MetricsSink, TraceSink};
