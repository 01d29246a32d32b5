//! Live reconfiguration of the routing table.
//!
//! # Data Flow
//! ```text
//! SIGUSR2 / SIGHUP ─┐
//! POST /admin/reload├─→ ReloadHandle::request_refresh → Refresh ─┐
//!                   │                                            ├─→ queue (FIFO)
//! discovery watch ──┴─→ ReloadHandle::push ─────────→ Push ──────┘
//!                                                                   │
//!                                                                   ▼
//!                                               orchestrator.rs (one trigger at a time)
//!                                                 Refresh → poll source → replace_all
//!                                                 Push    → replace_all
//! ```
//!
//! # Design Decisions
//! - One queue for all trigger sources: arrival order is application order
//! - A failed poll leaves the table untouched; the loop stays live
//! - Pending refreshes coalesce; pushes never do (each is a full set)

pub mod orchestrator;
pub mod trigger;

pub use orchestrator::{ReloadOrchestrator, ReloadReport, ReloadStatus};
pub use trigger::{QueueClosed, ReloadHandle, ReloadTrigger};
