//! Best-effort re-resolution of redirect target hosts.
//!
//! # Responsibilities
//! - Resolve a target hostname to an IP address before redirecting
//! - Bound every lookup with a timeout
//! - Fall back to the original hostname on any failure
//!
//! # Design Decisions
//! - IP literals are never looked up
//! - The first address returned by the resolver is used

use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use crate::observability::metrics;

/// Boxed lookup future.
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<Vec<IpAddr>>> + Send + 'a>>;

/// Hostname to address resolution.
pub trait HostResolver: Send + Sync {
    fn lookup<'a>(&'a self, host: &'a str, port: u16) -> LookupFuture<'a>;
}

/// Resolver backed by the system (`getaddrinfo` via Tokio).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn lookup<'a>(&'a self, host: &'a str, port: u16) -> LookupFuture<'a> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host, port)).await?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
    }
}

/// Resolve `host` within `timeout`, returning the host to put in the redirect.
///
/// IPv6 results are bracketed. Any failure returns `host` unchanged.
pub async fn resolve_or_keep(resolver: &dyn HostResolver, host: &str, port: u16, timeout: Duration) -> String {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }

    match tokio::time::timeout(timeout, resolver.lookup(bare, port)).await {
        Ok(Ok(addrs)) => match addrs.first() {
            Some(IpAddr::V4(ip)) => {
                metrics::record_dns_lookup("resolved");
                ip.to_string()
            }
            Some(IpAddr::V6(ip)) => {
                metrics::record_dns_lookup("resolved");
                format!("[{}]", ip)
            }
            None => {
                tracing::warn!(host, "DNS lookup returned no addresses, keeping hostname");
                metrics::record_dns_lookup("empty");
                host.to_string()
            }
        },
        Ok(Err(e)) => {
            tracing::warn!(host, error = %e, "Unable to look up IP, keeping hostname");
            metrics::record_dns_lookup("error");
            host.to_string()
        }
        Err(_) => {
            tracing::warn!(host, timeout = ?timeout, "DNS lookup timed out, keeping hostname");
            metrics::record_dns_lookup("timeout");
            host.to_string()
        }
    }
}
