//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the application router with the region redirect layer
//! - Optionally resolve country codes before the region layer
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve until shutdown is signalled

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RouterConfig;
use crate::http::middleware::{country_code_middleware, region_redirect_middleware, Geocoder, RegionRedirect};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::routing::RoutingTable;

/// HTTP front end that redirects requests to their regional backend.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Server whose pass-through traffic ends in a plain 404.
    pub fn new(config: RouterConfig, table: Arc<RoutingTable>) -> Self {
        Self::with_app(config, table, Router::new().fallback(not_found))
    }

    /// Server that passes unredirected requests to `app`.
    pub fn with_app(config: RouterConfig, table: Arc<RoutingTable>, app: Router) -> Self {
        let router = Self::build_router(&config, table, app);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, table: Arc<RoutingTable>, app: Router) -> Router {
        let region = RegionRedirect::from_config(table, &config.redirect);
        let mut router = app.layer(middleware::from_fn_with_state(region, region_redirect_middleware));

        if config.geocoder.enabled {
            match Geocoder::new(&config.geocoder) {
                Ok(geocoder) => {
                    tracing::info!(address = %config.geocoder.address, "Country code resolution enabled");
                    router = router.layer(middleware::from_fn_with_state(Arc::new(geocoder), country_code_middleware));
                }
                Err(e) => tracing::error!(error = %e, "Failed to build geocoder client, country resolution disabled"),
            }
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            redirect_status = self.config.redirect.status_code,
            resolve_dns = self.config.redirect.resolve_dns,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The fully layered router, for in-process use.
    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_layers_redirect_and_tag_request_id() {
        let table = Arc::new(RoutingTable::new());
        table.set("de", "https://de.example.com");
        let router = HttpServer::new(RouterConfig::default(), table).into_router();

        let res = router
            .oneshot(
                Request::builder()
                    .uri("/v1/items?x=1")
                    .header(header::HOST, "router.example.com")
                    .header("x-country-code", "de")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "https://de.example.com/v1/items?x=1");
        assert!(res.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_pass_through_reaches_fallback() {
        let router = HttpServer::new(RouterConfig::default(), Arc::new(RoutingTable::new())).into_router();

        let res = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
