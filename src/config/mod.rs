//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → CLI flags override selected fields in main
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the routing table changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ConsulConfig, DiscoveryBackend, DiscoveryConfig, FileSourceConfig, GeocoderConfig,
    ListenerConfig, ObservabilityConfig, RedirectConfig, RouterConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
