//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! SIGTERM / SIGINT ─→ Shutdown::trigger ─→ server, orchestrator, watcher, admin stop
//! SIGUSR2 / SIGHUP ─→ ReloadHandle::request_refresh("signal")
//! ```
//!
//! # Design Decisions
//! - Every long-running task holds a shutdown receiver and drops it on exit
//! - Shutdown waits for those receivers up to a deadline, then gives up

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_reload_signals, spawn_shutdown_on_signal, wait_for_shutdown_signal};
