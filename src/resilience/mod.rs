//! Retry pacing for long-lived background loops.

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
