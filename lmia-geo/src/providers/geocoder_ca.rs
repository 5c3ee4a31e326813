//! geocoder.ca client
//!
//! Secondary free geocoder with Canadian postal-code coverage. Anonymous
//! use is throttled; an auth code lifts the daily limit.
//!
//! Successful responses carry `latt`/`longt`; failures carry an `error`
//! object (`{"error":{"code":"008","description":"..."}}`).

use super::json_coordinate;
use crate::postal_code::PostalCode;
use crate::types::{Coordinates, GeocodingProvider, ProviderError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const GEOCODER_CA_BASE_URL: &str = "https://geocoder.ca";

const PACING: Duration = Duration::from_millis(1500);

pub struct GeocoderCaClient {
    http_client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl GeocoderCaClient {
    pub fn new(http_client: reqwest::Client, auth: Option<String>) -> Self {
        Self {
            http_client,
            base_url: GEOCODER_CA_BASE_URL.to_string(),
            auth,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Extract `latt`/`longt` from a geocoder.ca JSON response
pub fn parse_response(body: &str) -> Result<Coordinates, ProviderError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("geocoder.ca response: {}", e)))?;

    if let Some(error) = json.get("error") {
        let description = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown error");
        return Err(ProviderError::NoMatch(format!("geocoder.ca: {}", description)));
    }

    let lat = json.get("latt").and_then(json_coordinate);
    let lon = json.get("longt").and_then(json_coordinate);

    match (lat, lon) {
        (Some(lat), Some(lon)) => Coordinates::parse(&lat, &lon)
            .ok_or_else(|| ProviderError::Parse(format!("unusable pair {:?},{:?}", lat, lon))),
        _ => Err(ProviderError::Parse("response without latt/longt".to_string())),
    }
}

#[async_trait]
impl GeocodingProvider for GeocoderCaClient {
    fn name(&self) -> &'static str {
        "geocoder.ca"
    }

    fn pacing(&self) -> Duration {
        PACING
    }

    async fn geocode(&self, code: &PostalCode) -> Result<Coordinates, ProviderError> {
        let url = format!("{}/", self.base_url);

        let mut query: Vec<(&str, &str)> = vec![("locate", code.as_str()), ("json", "1")];
        if let Some(auth) = &self.auth {
            query.push(("auth", auth.as_str()));
        }

        debug!(postal_code = %code, url = %url, "Querying geocoder.ca");

        let response = self.http_client.get(&url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{"standard":{"city":"St. John's","prov":"NL"},"longt":"-52.712831","latt":"47.561510"}"#;
        let coords = parse_response(body).unwrap();
        assert_eq!(coords.latitude, "47.561510");
        assert_eq!(coords.longitude, "-52.712831");
    }

    #[test]
    fn test_parse_numeric_values() {
        let coords = parse_response(r#"{"latt":45.4215,"longt":-75.6972}"#).unwrap();
        assert_eq!(coords.latitude, "45.4215");
    }

    #[test]
    fn test_parse_error_object_is_no_match() {
        let body = r#"{"error":{"code":"008","description":"Your request did not produce any results."}}"#;
        assert!(matches!(parse_response(body), Err(ProviderError::NoMatch(_))));
    }

    #[test]
    fn test_parse_empty_values() {
        assert!(parse_response(r#"{"latt":"","longt":""}"#).is_err());
        assert!(parse_response(r#"{"latt":"0.000000","longt":"0.000000"}"#).is_err());
        assert!(parse_response(r#"{}"#).is_err());
    }
}
