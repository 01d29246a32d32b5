//! Redirect decision logic.
//!
//! Pure function over a country code and one table generation; no I/O.

use crate::routing::table::RegionMap;

/// What the region layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward to the next handler unchanged.
    PassThrough,
    /// Redirect to the given backend target.
    Redirect(String),
    /// No route and no default for this country code.
    Unavailable { country_code: String },
}

/// Decide how to handle a request resolved to `country_code`.
///
/// Rules, in order: unresolved passes through, a region entry wins, then the
/// default entry, otherwise the region is unavailable.
pub fn decide(country_code: Option<&str>, table: &RegionMap) -> Decision {
    let code = match country_code {
        Some(code) if !code.is_empty() => code,
        _ => return Decision::PassThrough,
    };

    if let Some(target) = table.get(code) {
        return Decision::Redirect(target.to_string());
    }
    if let Some(target) = table.default_target() {
        return Decision::Redirect(target.to_string());
    }

    Decision::Unavailable {
        country_code: code.to_string(),
    }
}
