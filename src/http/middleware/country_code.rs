//! Country-code resolution middleware.
//!
//! Requests that arrive without `X-Country-Code` get one from a reverse
//! geocoder keyed by client IP (first `X-Forwarded-For` entry, else the peer
//! address). Any failure leaves the request unresolved, which the region layer
//! treats as pass-through.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{request::Parts, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::GeocoderConfig;
use crate::http::middleware::region::X_COUNTRY_CODE;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Error)]
pub enum GeocoderError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoder returned status {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct GeocoderResponse {
    #[serde(default)]
    country_code: String,
}

/// Client for the reverse geocoder's `/georeverse/<ip>` endpoint.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocoderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        let address = config.address.trim_end_matches('/');
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        Ok(Self { client, base_url })
    }

    /// Look up the country for `ip`. Returns the code as reported (may be empty).
    pub async fn country_code(&self, ip: IpAddr) -> Result<String, GeocoderError> {
        let url = format!("{}/georeverse/{}", self.base_url, ip);
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocoderError::Status(status.as_u16()));
        }
        let body: GeocoderResponse = response.json().await?;
        Ok(body.country_code)
    }
}

/// Client IP as seen by the edge: first `X-Forwarded-For` hop, else the peer.
pub fn client_ip(parts: &Parts) -> Option<IpAddr> {
    if let Some(forwarded) = parts.headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return first.parse().ok();
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

pub async fn country_code_middleware(
    State(geocoder): State<Arc<Geocoder>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.headers().contains_key(X_COUNTRY_CODE) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    if let Some(ip) = client_ip(&parts) {
        match geocoder.country_code(ip).await {
            Ok(code) if !code.is_empty() => match HeaderValue::from_str(&code.to_ascii_lowercase()) {
                Ok(value) => {
                    tracing::debug!(ip = %ip, region = %code, "Resolved client country");
                    parts.headers.insert(X_COUNTRY_CODE, value);
                }
                Err(_) => tracing::warn!(ip = %ip, "Geocoder returned an invalid country code"),
            },
            Ok(_) => tracing::debug!(ip = %ip, "Geocoder has no country for client"),
            Err(e) => tracing::warn!(ip = %ip, error = %e, "Country lookup failed"),
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
