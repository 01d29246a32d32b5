//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the region router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Redirect emission settings.
    pub redirect: RedirectConfig,

    /// Where region targets come from.
    pub discovery: DiscoveryConfig,

    /// Country-code resolution for requests without `X-Country-Code`.
    pub geocoder: GeocoderConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Redirect behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// HTTP status used for redirects (301, 302, 303, 307 or 308).
    pub status_code: u16,

    /// Re-resolve the target host to an IP before redirecting.
    pub resolve_dns: bool,

    /// Upper bound for one DNS lookup in milliseconds.
    pub dns_timeout_ms: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            status_code: 302,
            resolve_dns: false,
            dns_timeout_ms: 250,
        }
    }
}

/// Discovery backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryBackend {
    #[default]
    Consul,
    File,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub backend: DiscoveryBackend,

    /// Keep a watch open for pushed catalog changes.
    pub watch: bool,

    /// Base delay for watch reconnect backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for watch reconnect backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Capacity of the reload trigger queue.
    pub queue_capacity: usize,

    pub consul: ConsulConfig,

    pub file: FileSourceConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::Consul,
            watch: true,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            queue_capacity: 16,
            consul: ConsulConfig::default(),
            file: FileSourceConfig::default(),
        }
    }
}

/// Consul catalog settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent address, with or without scheme (e.g., "127.0.0.1:8500").
    pub address: String,

    /// Catalog service to look up.
    pub service: String,

    /// Tag to filter on (empty = no filter).
    pub tag: String,

    /// Blocking query wait time in seconds.
    pub wait_secs: u64,

    /// Scheme for services without `protocol` metadata.
    pub default_scheme: String,
}

impl ConsulConfig {
    /// Agent base URL without trailing slash.
    pub fn agent_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            service: "api".to_string(),
            tag: "v1".to_string(),
            wait_secs: 300,
            default_scheme: "https".to_string(),
        }
    }
}

/// Servers-file discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSourceConfig {
    pub path: String,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            path: "servers.toml".to_string(),
        }
    }
}

/// Reverse geocoder settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Resolve country codes for requests that arrive without one.
    pub enabled: bool,

    /// Geocoder host:port.
    pub address: String,

    /// Lookup timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:4041".to_string(),
            timeout_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:7001".to_string(),
        }
    }
}
