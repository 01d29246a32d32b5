//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → middleware/country_code.rs (fill X-Country-Code from the geocoder, optional)
//!     → middleware/region.rs (redirect, 503, or pass through)
//!     → application router
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
