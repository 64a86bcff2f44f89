//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ReceiverConfig (validated, immutable)
//!     → ReceiverOptions handed to Receiver::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the listener address cannot change
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DemuxConfig, GatewayConfig, ObservabilityConfig, ReceiverConfig, ReceiverOptions, ServiceConfig,
    StartupConfig,
};
pub use validation::{validate_config, validate_shared_options, ValidationError};
