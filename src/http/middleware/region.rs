//! Region redirect middleware.
//!
//! Reads `X-Country-Code`, consults the routing table and either forwards the
//! request, redirects it to the regional backend, or answers 503.

use axum::{
    body::Body,
    extract::State,
    http::{header, request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::RedirectConfig;
use crate::net::dns::{resolve_or_keep, HostResolver, SystemResolver};
use crate::observability::metrics;
use crate::routing::{decide, Decision, RoutingTable};

/// Header carrying the resolved ISO 3166-1 alpha-2 country code.
pub const X_COUNTRY_CODE: &str = "x-country-code";

/// Shared state of the region redirect layer. Reads the table, never writes it.
#[derive(Clone)]
pub struct RegionRedirect {
    table: Arc<RoutingTable>,
    status: StatusCode,
    resolver: Option<Arc<dyn HostResolver>>,
    dns_timeout: Duration,
}

impl RegionRedirect {
    /// Redirect with 302 Found and no DNS re-resolution.
    pub fn new(table: Arc<RoutingTable>) -> Self {
        Self {
            table,
            status: StatusCode::FOUND,
            resolver: None,
            dns_timeout: Duration::from_millis(250),
        }
    }

    pub fn from_config(table: Arc<RoutingTable>, config: &RedirectConfig) -> Self {
        let status = StatusCode::from_u16(config.status_code).unwrap_or(StatusCode::FOUND);
        let region = Self::new(table).with_status(status);
        if config.resolve_dns {
            region.with_resolver(Arc::new(SystemResolver), Duration::from_millis(config.dns_timeout_ms))
        } else {
            region
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Re-resolve target hosts through `resolver` before redirecting.
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>, timeout: Duration) -> Self {
        self.resolver = Some(resolver);
        self.dns_timeout = timeout;
        self
    }

    /// The response to send instead of calling the next handler, if any.
    pub async fn respond(&self, req: &Parts) -> Option<Response> {
        let country_code = req
            .headers
            .get(X_COUNTRY_CODE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());

        let snapshot = self.table.snapshot();
        match decide(country_code.as_deref(), &snapshot) {
            Decision::PassThrough => {
                metrics::record_decision("pass_through");
                None
            }
            Decision::Unavailable { country_code } => {
                tracing::debug!(region = %country_code, generation = snapshot.generation(), "No route for region");
                metrics::record_decision("unavailable");
                let body = format!("Service is unavailable in your region ({})", country_code);
                Some((StatusCode::SERVICE_UNAVAILABLE, body).into_response())
            }
            Decision::Redirect(target) => self.redirect(req, &target).await,
        }
    }

    async fn redirect(&self, req: &Parts, target: &str) -> Option<Response> {
        let dest = match Url::parse(target) {
            Ok(dest) => dest,
            Err(e) => {
                tracing::warn!(backend = target, error = %e, "Unusable region target, passing through");
                metrics::record_decision("invalid_target");
                return None;
            }
        };
        let host = match dest.host_str() {
            Some(host) if !host.is_empty() && !dest.scheme().is_empty() => host,
            _ => {
                tracing::warn!(backend = target, "Region target has no host, passing through");
                metrics::record_decision("invalid_target");
                return None;
            }
        };
        let authority = with_port(host, dest.port());

        // Already on the right server: serving it here avoids a redirect loop.
        if request_host(req).is_some_and(|h| h.eq_ignore_ascii_case(&authority)) {
            metrics::record_decision("same_host");
            return None;
        }

        let authority = match &self.resolver {
            Some(resolver) => {
                let port = dest.port_or_known_default().unwrap_or(80);
                let resolved = resolve_or_keep(resolver.as_ref(), host, port, self.dns_timeout).await;
                with_port(&resolved, dest.port())
            }
            None => authority,
        };

        let mut location = format!("{}://{}{}", dest.scheme(), authority, req.uri.path());
        if let Some(query) = req.uri.query().filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(query);
        }

        let value = match HeaderValue::from_str(&location) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "Invalid redirect location, passing through");
                metrics::record_decision("invalid_target");
                return None;
            }
        };

        tracing::debug!(backend = target, location = %location, status = %self.status, "Redirecting to region server");
        metrics::record_decision("redirect");
        Some((self.status, [(header::LOCATION, value)]).into_response())
    }
}

fn with_port(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Host the client addressed: the absolute-form authority, else the Host header.
fn request_host(req: &Parts) -> Option<&str> {
    req.uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| req.headers.get(header::HOST).and_then(|h| h.to_str().ok()))
}

/// Axum middleware entry point; install with `middleware::from_fn_with_state`.
pub async fn region_redirect_middleware(
    State(region): State<RegionRedirect>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    match region.respond(&parts).await {
        Some(response) => response,
        None => next.run(Request::from_parts(parts, body)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ServerDefinition;
    use crate::net::dns::LookupFuture;
    use axum::{middleware, Router};
    use std::net::IpAddr;
    use tower::ServiceExt;

    fn table(entries: &[(&str, &str)]) -> Arc<RoutingTable> {
        let table = Arc::new(RoutingTable::new());
        for (code, target) in entries {
            table.set(code, target);
        }
        table
    }

    fn app(region: RegionRedirect) -> Router {
        Router::new()
            .fallback(|| async { "next handler" })
            .layer(middleware::from_fn_with_state(region, region_redirect_middleware))
    }

    fn request(uri: &str, host: &str, country: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).header(header::HOST, host);
        if let Some(country) = country {
            builder = builder.header(X_COUNTRY_CODE, country);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_redirect_preserves_path_and_query() {
        let app = app(RegionRedirect::new(table(&[("de", "https://de.example.com")])));

        let res = app
            .oneshot(request("/v1/items?x=1", "router.example.com", Some("de")))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://de.example.com/v1/items?x=1");
    }

    #[tokio::test]
    async fn test_country_code_is_case_insensitive() {
        let app = app(RegionRedirect::new(table(&[("de", "https://de.example.com:8443")])));

        let res = app.oneshot(request("/a/b", "router.example.com", Some("DE"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://de.example.com:8443/a/b");
    }

    #[tokio::test]
    async fn test_missing_country_passes_through_even_with_default() {
        let app = app(RegionRedirect::new(table(&[("default", "https://x.com")])));

        let res = app.oneshot(request("/", "router.example.com", None)).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "next handler");
    }

    #[tokio::test]
    async fn test_unknown_region_falls_back_to_default() {
        let app = app(RegionRedirect::new(table(&[
            ("de", "https://de.x.com"),
            ("default", "https://x.com"),
        ])));

        let res = app
            .oneshot(request("/v1/items?x=1&y=%20z", "router.example.com", Some("fr")))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://x.com/v1/items?x=1&y=%20z");
    }

    #[tokio::test]
    async fn test_unavailable_names_region() {
        let app = app(RegionRedirect::new(table(&[("de", "https://de.x.com")])));

        let res = app.oneshot(request("/", "router.example.com", Some("fr"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(res).await, "Service is unavailable in your region (fr)");
    }

    #[tokio::test]
    async fn test_same_host_is_not_redirected() {
        let app = app(RegionRedirect::new(table(&[("de", "https://de.x.com")])));

        let res = app.oneshot(request("/v1", "DE.X.COM", Some("de"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "next handler");
    }

    #[tokio::test]
    async fn test_unusable_target_passes_through() {
        for target in ["not a url", "de.x.com", "mailto:ops@x.com"] {
            let app = app(RegionRedirect::new(table(&[("de", target)])));
            let res = app.oneshot(request("/", "router.example.com", Some("de"))).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK, "target {target:?} should pass through");
        }
    }

    #[tokio::test]
    async fn test_configured_status_code() {
        let config = RedirectConfig {
            status_code: 307,
            ..RedirectConfig::default()
        };
        let app = app(RegionRedirect::from_config(table(&[("at", "https://at.x.com")]), &config));

        let res = app.oneshot(request("/", "router.example.com", Some("at"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&res), "https://at.x.com/");
    }

    struct FixedResolver(Option<IpAddr>);

    impl HostResolver for FixedResolver {
        fn lookup<'a>(&'a self, _host: &'a str, _port: u16) -> LookupFuture<'a> {
            let result = match self.0 {
                Some(ip) => Ok(vec![ip]),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such host")),
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn test_target_host_is_re_resolved() {
        let resolver = Arc::new(FixedResolver(Some("10.0.0.7".parse().unwrap())));
        let region = RegionRedirect::new(table(&[("de", "https://de.x.com:8443")]))
            .with_resolver(resolver, Duration::from_millis(100));

        let res = app(region).oneshot(request("/p?q=1", "router.example.com", Some("de"))).await.unwrap();

        assert_eq!(location(&res), "https://10.0.0.7:8443/p?q=1");
    }

    #[tokio::test]
    async fn test_failed_re_resolution_keeps_hostname() {
        let region = RegionRedirect::new(table(&[("de", "https://de.x.com:8443")]))
            .with_resolver(Arc::new(FixedResolver(None)), Duration::from_millis(100));

        let res = app(region).oneshot(request("/p", "router.example.com", Some("de"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://de.x.com:8443/p");
    }

    #[tokio::test]
    async fn test_sees_table_replacement() {
        let table = Arc::new(RoutingTable::new());
        let app = app(RegionRedirect::new(table.clone()));

        let res = app.clone().oneshot(request("/", "router.example.com", Some("nl"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        table.replace_all(&[ServerDefinition::new("https://nl.x.com", "nl", false)]);

        let res = app.oneshot(request("/", "router.example.com", Some("nl"))).await.unwrap();
        assert_eq!(location(&res), "https://nl.x.com/");
    }
}
