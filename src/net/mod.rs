//! Network helpers.
//!
//! `dns.rs` re-resolves redirect targets when `redirect.resolve_dns` is on.
//! Lookups are bounded by a timeout and fall back to the hostname.

pub mod dns;

pub use dns::{resolve_or_keep, HostResolver, SystemResolver};
