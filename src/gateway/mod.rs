//! HTTP/JSON gateway in front of the gRPC services.
//!
//! # Data Flow
//! ```text
//! Gateway virtual listener
//!     → server.rs (axum Router + tower-http middleware)
//!     → handlers.rs (JSON decode, grpc-metadata-* headers)
//!     → loopback tonic Channel to the shared listener
//!     → demultiplexer classifies it as RPC → rpc::RpcServer
//!     → status.rs maps the gRPC status back to HTTP
//! ```

pub mod handlers;
pub mod server;
pub mod status;

pub use server::GatewayServer;
pub use status::GatewayError;
