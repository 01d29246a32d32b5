//! Consul catalog discovery.
//!
//! # Responsibilities
//! - Query `/v1/catalog/service/<service>?tag=<tag>`
//! - Translate catalog entries into `ServerDefinition`s
//! - Long-poll with blocking queries (`index` + `wait`) for push updates
//!
//! # Design Decisions
//! - `ServiceAddress` wins over the node `Address`
//! - Scheme comes from `ServiceMeta.protocol`, else the configured default
//! - Tag `default` marks the fallback server; first `region-<cc>` tag wins

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ConsulConfig;
use crate::discovery::{DiscoveryError, DiscoveryFuture, DiscoverySource, ServerDefinition, WatchBatch};

const REGION_TAG_PREFIX: &str = "region-";
const DEFAULT_TAG: &str = "default";
const CONSUL_INDEX_HEADER: &str = "x-consul-index";

/// Subset of a Consul `CatalogService` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogService {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub service_address: String,
    #[serde(default)]
    pub service_port: u16,
    #[serde(default)]
    pub service_tags: Option<Vec<String>>,
    #[serde(default)]
    pub service_meta: Option<HashMap<String, String>>,
}

/// Build a routing definition from a catalog entry.
pub fn server_from_catalog_entry(entry: &CatalogService, default_scheme: &str) -> ServerDefinition {
    let address = if entry.service_address.is_empty() {
        entry.address.as_str()
    } else {
        entry.service_address.as_str()
    };

    // Consul has no protocol field; it is hinted through service metadata.
    let scheme = entry
        .service_meta
        .as_ref()
        .and_then(|meta| meta.get("protocol"))
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .unwrap_or(default_scheme);

    let host = if address.contains(':') {
        format!("[{}]", address)
    } else {
        address.to_string()
    };

    let mut country_code = String::new();
    let mut is_default = false;
    for tag in entry.service_tags.iter().flatten() {
        if tag == DEFAULT_TAG {
            is_default = true;
        } else if let Some(code) = tag.strip_prefix(REGION_TAG_PREFIX) {
            if country_code.is_empty() {
                country_code = code.to_ascii_lowercase();
            }
        }
    }

    ServerDefinition::new(
        format!("{}://{}:{}", scheme, host, entry.service_port),
        country_code,
        is_default,
    )
}

/// Discovery source backed by a Consul agent's catalog API.
pub struct ConsulSource {
    client: reqwest::Client,
    config: ConsulConfig,
    base_url: String,
}

impl ConsulSource {
    pub fn new(config: ConsulConfig) -> Result<Self, DiscoveryError> {
        // Blocking queries may hold the connection for the full wait time,
        // plus the jitter Consul adds (wait / 16).
        let timeout = Duration::from_secs(config.wait_secs + config.wait_secs / 16 + 10);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = config.agent_url();

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn catalog_url(&self) -> String {
        format!("{}/v1/catalog/service/{}", self.base_url, self.config.service)
    }

    async fn fetch(&self, index: Option<u64>) -> Result<WatchBatch, DiscoveryError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if !self.config.tag.is_empty() {
            query.push(("tag", self.config.tag.clone()));
        }
        if let Some(index) = index {
            query.push(("index", index.to_string()));
            query.push(("wait", format!("{}s", self.config.wait_secs)));
        }

        let response = self.client.get(self.catalog_url()).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let new_index = response
            .headers()
            .get(CONSUL_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let body = response.bytes().await?;
        let entries: Vec<CatalogService> =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        let servers = entries
            .iter()
            .map(|entry| server_from_catalog_entry(entry, &self.config.default_scheme))
            .collect();

        Ok(WatchBatch {
            index: new_index,
            servers,
        })
    }
}

impl DiscoverySource for ConsulSource {
    fn poll(&self) -> DiscoveryFuture<'_, Vec<ServerDefinition>> {
        Box::pin(async move { Ok(self.fetch(None).await?.servers) })
    }

    fn watch(&self, last_index: u64) -> DiscoveryFuture<'_, WatchBatch> {
        Box::pin(async move {
            let index = if last_index == 0 { None } else { Some(last_index) };
            self.fetch(index).await
        })
    }

    fn name(&self) -> &'static str {
        "consul"
    }
}
