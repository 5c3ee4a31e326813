//! Nominatim (OpenStreetMap) client
//!
//! Free community geocoder. Usage policy: at most 1 request per second and a
//! descriptive User-Agent.
//!
//! # API Reference
//! - Endpoint: https://nominatim.openstreetmap.org/search
//! - Documentation: https://nominatim.org/release-docs/latest/api/Search/

use crate::postal_code::PostalCode;
use crate::types::{Coordinates, GeocodingProvider, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Slightly over the 1 req/s policy
const PACING: Duration = Duration::from_millis(1100);

pub struct NominatimClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: NOMINATIM_BASE_URL.to_string(),
        }
    }

    /// Point at another Nominatim instance
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Option<String>,
    lon: Option<String>,
}

/// Extract the first place's coordinates from a search response
pub fn parse_response(body: &str) -> Result<Coordinates, ProviderError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Nominatim response: {}", e)))?;

    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoMatch("Nominatim returned no places".to_string()))?;

    match (place.lat, place.lon) {
        (Some(lat), Some(lon)) => Coordinates::parse(&lat, &lon)
            .ok_or_else(|| ProviderError::Parse(format!("unusable pair {:?},{:?}", lat, lon))),
        _ => Err(ProviderError::Parse("place without lat/lon".to_string())),
    }
}

#[async_trait]
impl GeocodingProvider for NominatimClient {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    fn pacing(&self) -> Duration {
        PACING
    }

    async fn geocode(&self, code: &PostalCode) -> Result<Coordinates, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let postal = code.display_form();

        debug!(postal_code = %code, url = %url, "Querying Nominatim");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("postalcode", postal.as_str()),
                ("country", "ca"),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}
