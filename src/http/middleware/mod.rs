//! Request middleware, outermost first:
//! - country_code.rs: resolve `X-Country-Code` from the client IP (optional)
//! - region.rs: redirect to the regional backend or answer 503

pub mod country_code;
pub mod region;

pub use country_code::{country_code_middleware, Geocoder, GeocoderError};
pub use region::{region_redirect_middleware, RegionRedirect, X_COUNTRY_CODE};
