//! Google Geocoding API client (premium)
//!
//! # API Reference
//! - Endpoint: https://maps.googleapis.com/maps/api/geocode/json
//! - Statuses: `OK`, `ZERO_RESULTS`, `OVER_QUERY_LIMIT`, `REQUEST_DENIED`, `INVALID_REQUEST`

use crate::postal_code::PostalCode;
use crate::types::{Coordinates, GeocodingProvider, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const GOOGLE_BASE_URL: &str = "https://maps.googleapis.com";

const PACING: Duration = Duration::from_millis(50);

pub struct GoogleClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleClient {
    pub fn new(http_client: reqwest::Client, api_key: String) -> Self {
        Self {
            http_client,
            base_url: GOOGLE_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Extract the first result's location from a geocode response
pub fn parse_response(body: &str) -> Result<Coordinates, ProviderError> {
    let response: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Google response: {}", e)))?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => {
            return Err(ProviderError::NoMatch("Google returned ZERO_RESULTS".to_string()));
        }
        other => {
            let message = response.error_message.unwrap_or_default();
            warn!(status = other, message = %message, "Google Geocoding API refused request");
            return Err(ProviderError::Api(200, format!("{}: {}", other, message)));
        }
    }

    let location = response
        .results
        .into_iter()
        .next()
        .map(|r| r.geometry.location)
        .ok_or_else(|| ProviderError::NoMatch("Google status OK without results".to_string()))?;

    match (location.lat, location.lng) {
        (Some(lat), Some(lng)) => Coordinates::from_f64(lat, lng)
            .ok_or_else(|| ProviderError::Parse(format!("unusable pair {},{}", lat, lng))),
        _ => Err(ProviderError::Parse("location without lat/lng".to_string())),
    }
}

#[async_trait]
impl GeocodingProvider for GoogleClient {
    fn name(&self) -> &'static str {
        "Google"
    }

    fn is_premium(&self) -> bool {
        true
    }

    fn pacing(&self) -> Duration {
        PACING
    }

    async fn geocode(&self, code: &PostalCode) -> Result<Coordinates, ProviderError> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let address = code.display_form();

        // The URL carries the key, so log the postal code only
        debug!(postal_code = %code, "Querying Google Geocoding API");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("address", address.as_str()),
                ("components", "country:CA"),
                ("key", self.api_key.as_str()),
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
