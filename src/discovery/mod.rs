//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Consul catalog / servers file
//!     → consul.rs | file.rs (query, decode into ServerDefinition)
//!     → poll():  one-shot full set (refresh triggers)
//!     → watch(): blocking query, returns when the catalog index moves
//!     → watch.rs (loop + reconnect) → reload queue
//! ```
//!
//! # Design Decisions
//! - Every batch is a full replacement set, never a diff
//! - Sources only fetch and decode; retries and backoff live in watch.rs
//! - Sources are trait objects so tests can script them

pub mod consul;
pub mod file;
pub mod watch;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub use consul::ConsulSource;
pub use file::FileSource;
pub use watch::DiscoveryWatcher;

/// One discovered backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// `scheme://host[:port]`; path and query come from the redirected request.
    pub target: String,

    /// Lowercase ISO 3166-1 alpha-2 code, empty when not region-tagged.
    #[serde(default)]
    pub country_code: String,

    /// Designated fallback for unmatched country codes.
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

impl ServerDefinition {
    pub fn new(target: impl Into<String>, country_code: impl Into<String>, is_default: bool) -> Self {
        Self {
            target: target.into(),
            country_code: country_code.into().to_ascii_lowercase(),
            is_default,
        }
    }
}

/// A full replacement set tagged with the source's change index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBatch {
    pub index: u64,
    pub servers: Vec<ServerDefinition>,
}

/// Errors raised by discovery sources.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The catalog could not be reached.
    #[error("discovery request failed: {0}")]
    Request(String),

    /// The catalog answered with a non-success status.
    #[error("discovery returned status {0}")]
    Status(u16),

    /// The payload could not be decoded into server definitions.
    #[error("malformed discovery payload: {0}")]
    Malformed(String),

    /// A watch response carried no change index, so the next query cannot block.
    #[error("discovery watch response carried no index")]
    MissingIndex,

    #[error("discovery I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DiscoveryError::Malformed(err.to_string())
        } else {
            DiscoveryError::Request(err.to_string())
        }
    }
}

/// Boxed future returned by discovery sources.
pub type DiscoveryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DiscoveryError>> + Send + 'a>>;

/// A catalog of region-tagged backends.
pub trait DiscoverySource: Send + Sync {
    /// Query the current full set of servers.
    fn poll(&self) -> DiscoveryFuture<'_, Vec<ServerDefinition>>;

    /// Wait until the catalog index moves past `last_index`, then return the
    /// new full set. `last_index == 0` returns immediately.
    ///
    /// Returning the same index means nothing changed (e.g. the wait expired).
    fn watch(&self, last_index: u64) -> DiscoveryFuture<'_, WatchBatch>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
