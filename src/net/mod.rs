//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (the one bound listener)
//!     → demux.rs (accept loop, per-connection classification)
//!     → sniff.rs (HTTP/2 preface + HPACK content-type check)
//!     → connection.rs (SniffedStream replays the inspected prefix)
//!     → VirtualListener (rpc | gateway)
//!     → serve.rs (hyper connection per stream)
//! ```
//!
//! # Design Decisions
//! - One real listener, two virtual ones; each connection reaches exactly one
//! - Classification never consumes bytes
//! - Accept failure on the real listener is terminal for both servers

pub mod connection;
pub mod demux;
pub mod listener;
pub mod serve;
pub mod sniff;

pub use demux::Demultiplexer;
pub use listener::VirtualListener;
pub use sniff::Protocol;
