//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (redirect status, timeouts, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{DiscoveryBackend, RouterConfig};

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if !REDIRECT_STATUSES.contains(&config.redirect.status_code) {
        errors.push(ValidationError::new(
            "redirect.status_code",
            format!("{} is not a redirect status (301, 302, 303, 307, 308)", config.redirect.status_code),
        ));
    }

    if config.redirect.resolve_dns && config.redirect.dns_timeout_ms == 0 {
        errors.push(ValidationError::new("redirect.dns_timeout_ms", "must be greater than 0"));
    }

    let discovery = &config.discovery;
    if discovery.retry_base_delay_ms == 0 || discovery.retry_base_delay_ms > discovery.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "discovery.retry_base_delay_ms",
            "must be greater than 0 and not exceed retry_max_delay_ms",
        ));
    }

    if discovery.queue_capacity == 0 {
        errors.push(ValidationError::new("discovery.queue_capacity", "must be greater than 0"));
    }

    match discovery.backend {
        DiscoveryBackend::Consul => {
            if discovery.consul.service.is_empty() {
                errors.push(ValidationError::new("discovery.consul.service", "must not be empty"));
            }
            if discovery.consul.address.is_empty() {
                errors.push(ValidationError::new("discovery.consul.address", "must not be empty"));
            }
            if !matches!(discovery.consul.default_scheme.as_str(), "http" | "https") {
                errors.push(ValidationError::new(
                    "discovery.consul.default_scheme",
                    format!("'{}' must be http or https", discovery.consul.default_scheme),
                ));
            }
        }
        DiscoveryBackend::File => {
            if discovery.file.path.is_empty() {
                errors.push(ValidationError::new("discovery.file.path", "must not be empty"));
            }
        }
    }

    if config.geocoder.enabled && config.geocoder.address.is_empty() {
        errors.push(ValidationError::new("geocoder.address", "must not be empty when enabled"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty when enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
