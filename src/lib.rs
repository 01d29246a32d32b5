//! Region-aware redirect router library.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reload;
pub mod resilience;
pub mod routing;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reload::ReloadOrchestrator;
pub use routing::RoutingTable;
