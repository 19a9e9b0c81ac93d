//! IP geolocation seam.
//!
//! Sessions store an ISO 3166-1 alpha-2 country code. Resolution is behind a
//! trait so deployments can wire in a real geo database; the default resolver
//! reports every address as unknown.

/// Country code recorded when an IP cannot be resolved.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Resolution seam: maps a client IP to an ISO country code, or
/// [`UNKNOWN_COUNTRY`] when no answer exists.
pub trait GeoResolver: Send + Sync {
    fn country(&self, ip: &str) -> String;
}

/// Default resolver for deployments without a geo database.
///
/// Never fails: unparsable, private, and unmapped addresses all resolve to
/// [`UNKNOWN_COUNTRY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGeoResolver;

impl GeoResolver for NullGeoResolver {
    fn country(&self, _ip: &str) -> String {
        UNKNOWN_COUNTRY.to_string()
    }
}
