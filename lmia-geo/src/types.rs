//! Core types and the provider trait
//!
//! - `Coordinates`: a validated latitude/longitude pair kept as decimal strings
//! - `GeocodeResult`: `Found` or `NotFound`, the internal result type
//! - `GeocodingProvider`: one external geocoding service

use crate::postal_code::PostalCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Provider name reported for results served from the location cache
pub const CACHE_PROVIDER: &str = "cache";

/// Latitude/longitude as decimal strings, exactly as the provider reported them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
}

impl Coordinates {
    /// Validate a raw pair from a provider response
    ///
    /// Rejects empty values, non-numeric or non-finite values, out-of-range
    /// values and the `(0, 0)` pair some providers return instead of "no match".
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let latitude = latitude.trim();
        let longitude = longitude.trim();

        let lat: f64 = latitude.parse().ok()?;
        let lon: f64 = longitude.parse().ok()?;

        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        if lat == 0.0 && lon == 0.0 {
            return None;
        }

        Some(Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        })
    }

    /// Build from numeric JSON values (Google, Mapbox)
    pub fn from_f64(latitude: f64, longitude: f64) -> Option<Self> {
        Self::parse(&latitude.to_string(), &longitude.to_string())
    }
}

/// Outcome of resolving one postal code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeResult {
    Found {
        latitude: String,
        longitude: String,
        /// Provider name, or [`CACHE_PROVIDER`] for cache hits
        provider: String,
    },
    NotFound,
}

impl GeocodeResult {
    pub fn found(coords: Coordinates, provider: impl Into<String>) -> Self {
        GeocodeResult::Found {
            latitude: coords.latitude,
            longitude: coords.longitude,
            provider: provider.into(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, GeocodeResult::Found { .. })
    }

    /// `(latitude, longitude)` or `None`
    pub fn coordinates(&self) -> Option<(&str, &str)> {
        match self {
            GeocodeResult::Found {
                latitude,
                longitude,
                ..
            } => Some((latitude, longitude)),
            GeocodeResult::NotFound => None,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            GeocodeResult::Found { provider, .. } => Some(provider),
            GeocodeResult::NotFound => None,
        }
    }

    /// Text boundary form: `"<lat>,<lon>"`, or `","` when nothing was found
    pub fn to_field_pair(&self) -> String {
        match self.coordinates() {
            Some((lat, lon)) => format!("{},{}", lat, lon),
            None => ",".to_string(),
        }
    }
}

/// Why a single provider did not produce coordinates
///
/// Never surfaced to callers of the orchestrator; the chain logs it and moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No match for {0}")]
    NoMatch(String),
}

/// The request URL is dropped: Google and Mapbox carry credentials in the
/// query string, and this text ends up in logs.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// One external geocoding service
///
/// Implementations build their own request, extract coordinates from their
/// own response shape, and report any failure as `ProviderError`. Pacing is
/// applied by the chain after every call using [`GeocodingProvider::pacing`].
///
/// # Example
/// ```rust,ignore
/// pub struct FixedProvider;
///
/// #[async_trait::async_trait]
/// impl GeocodingProvider for FixedProvider {
///     fn name(&self) -> &'static str { "Fixed" }
///     fn pacing(&self) -> Duration { Duration::ZERO }
///
///     async fn geocode(&self, _code: &PostalCode) -> Result<Coordinates, ProviderError> {
///         Coordinates::parse("45.4215", "-75.6972")
///             .ok_or_else(|| ProviderError::Parse("bad pair".to_string()))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Provider name for logging and stats
    fn name(&self) -> &'static str;

    /// Paid, higher-throughput provider (eligible for turbo and budgeting)
    fn is_premium(&self) -> bool {
        false
    }

    /// Delay applied after every call to respect the provider's rate limit
    fn pacing(&self) -> Duration;

    /// Resolve a postal code to coordinates
    async fn geocode(&self, code: &PostalCode) -> Result<Coordinates, ProviderError>;
}
