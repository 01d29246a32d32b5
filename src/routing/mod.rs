//! Region routing subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery batch (Vec<ServerDefinition>)
//!     → table.rs (build RegionMap off to the side)
//!     → atomic swap of Arc<RegionMap>
//!
//! Incoming request (X-Country-Code)
//!     → table.rs (snapshot of current generation)
//!     → decider.rs (pass-through / redirect / unavailable)
//! ```
//!
//! # Design Decisions
//! - Readers never lock; a snapshot is one complete generation
//! - Writers are serialized; rebuilds never expose a partial table
//! - First write wins for duplicate country codes

pub mod decider;
pub mod table;

pub use decider::{decide, Decision};
pub use table::{RegionMap, ReplaceSummary, RoutingTable, DEFAULT_KEY};
