//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (decision counters, reload counters, table size)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (region, target, generation)
//! - Request ID flows through the HTTP trace span
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
