//! Mapbox Geocoding API client (premium)
//!
//! Features carry `center` as `[longitude, latitude]`.

use crate::postal_code::PostalCode;
use crate::types::{Coordinates, GeocodingProvider, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const MAPBOX_BASE_URL: &str = "https://api.mapbox.com";

const PACING: Duration = Duration::from_millis(100);

pub struct MapboxClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MapboxClient {
    pub fn new(http_client: reqwest::Client, access_token: String) -> Self {
        Self {
            http_client,
            base_url: MAPBOX_BASE_URL.to_string(),
            access_token,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MapboxResponse {
    #[serde(default)]
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    #[serde(default)]
    center: Vec<f64>,
}

/// Extract the first feature's center from a forward-geocoding response
pub fn parse_response(body: &str) -> Result<Coordinates, ProviderError> {
    let response: MapboxResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Mapbox response: {}", e)))?;

    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoMatch("Mapbox returned no features".to_string()))?;

    match feature.center.as_slice() {
        [lon, lat] => Coordinates::from_f64(*lat, *lon)
            .ok_or_else(|| ProviderError::Parse(format!("unusable center {},{}", lon, lat))),
        other => Err(ProviderError::Parse(format!(
            "center has {} values, expected 2",
            other.len()
        ))),
    }
}

#[async_trait]
impl GeocodingProvider for MapboxClient {
    fn name(&self) -> &'static str {
        "Mapbox"
    }

    fn is_premium(&self) -> bool {
        true
    }

    fn pacing(&self) -> Duration {
        PACING
    }

    async fn geocode(&self, code: &PostalCode) -> Result<Coordinates, ProviderError> {
        let url = format!(
            "{}/geocoding/v5/mapbox.places/{}.json",
            self.base_url,
            code.as_str()
        );

        debug!(postal_code = %code, "Querying Mapbox Geocoding API");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("country", "ca"),
                ("types", "postcode"),
                ("limit", "1"),
                ("access_token", self.access_token.as_str()),
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
