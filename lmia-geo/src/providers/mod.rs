//! Geocoding provider chain
//!
//! # Providers
//! 1. **nominatim** - OpenStreetMap community geocoder (free, 1 req/s)
//! 2. **geocoder_ca** - geocoder.ca (free, throttled; optional auth code)
//! 3. **google** - Google Geocoding API (premium, needs API key)
//! 4. **mapbox** - Mapbox Geocoding API (premium, needs access token)
//!
//! Premium providers without credentials are not constructed. In turbo mode
//! the first configured premium provider moves to the front of the chain.
//!
//! # Error isolation
//! A provider that errors, times out, or returns no usable pair is a miss for
//! that provider only; the chain logs it and tries the next one.

pub mod geocoder_ca;
pub mod google;
pub mod mapbox;
pub mod nominatim;

pub use geocoder_ca::GeocoderCaClient;
pub use google::GoogleClient;
pub use mapbox::MapboxClient;
pub use nominatim::NominatimClient;

use crate::config::GeocoderSettings;
use crate::postal_code::PostalCode;
use crate::types::{GeocodeResult, GeocodingProvider};
use lmia_common::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// User agent sent to every provider (Nominatim rejects anonymous clients)
pub const USER_AGENT: &str = concat!(
    "lmia-geo/",
    env!("CARGO_PKG_VERSION"),
    " (labour market report geocoder)"
);

/// Build the shared HTTP client with connect and total timeouts
pub fn http_client(connect_timeout: Duration, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Build the chain described by the settings
pub fn chain_from_settings(settings: &GeocoderSettings) -> Result<ProviderChain> {
    let client = http_client(settings.connect_timeout, settings.timeout)?;

    let mut providers: Vec<Arc<dyn GeocodingProvider>> = vec![
        Arc::new(NominatimClient::new(client.clone())),
        Arc::new(GeocoderCaClient::new(
            client.clone(),
            settings.geocoder_ca_auth.clone(),
        )),
    ];

    if let Some(key) = &settings.google_api_key {
        providers.push(Arc::new(GoogleClient::new(client.clone(), key.clone())));
    }
    if let Some(token) = &settings.mapbox_token {
        providers.push(Arc::new(MapboxClient::new(client.clone(), token.clone())));
    }

    if settings.turbo && !providers.iter().any(|p| p.is_premium()) {
        warn!("Turbo mode requested but no premium provider is configured; using standard order");
    }

    let chain = ProviderChain::new(providers, settings.turbo)
        .with_pacing_override(settings.pacing_override)
        .with_premium_budget(settings.premium_budget);

    info!(providers = ?chain.provider_names(), turbo = settings.turbo, "Provider chain ready");
    Ok(chain)
}

/// Move the first premium provider to the front when turbo is on
///
/// Standard order is kept otherwise, including when no premium provider is
/// configured.
pub fn turbo_order(
    mut providers: Vec<Arc<dyn GeocodingProvider>>,
    turbo: bool,
) -> Vec<Arc<dyn GeocodingProvider>> {
    if turbo {
        if let Some(pos) = providers.iter().position(|p| p.is_premium()) {
            let premium = providers.remove(pos);
            providers.insert(0, premium);
        }
    }
    providers
}

/// Cap on premium-provider calls for one run
#[derive(Debug)]
struct PremiumBudget {
    remaining: AtomicU64,
}

impl PremiumBudget {
    fn new(limit: u64) -> Self {
        Self {
            remaining: AtomicU64::new(limit),
        }
    }

    /// Take one call from the budget; `false` once it is spent
    fn try_spend(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }
}

/// Ordered providers tried in sequence until one finds the postal code
pub struct ProviderChain {
    providers: Vec<Arc<dyn GeocodingProvider>>,
    pacing_override: Option<Duration>,
    premium_budget: Option<PremiumBudget>,
}

impl ProviderChain {
    /// Create a chain from providers in standard order
    pub fn new(providers: Vec<Arc<dyn GeocodingProvider>>, turbo: bool) -> Self {
        Self {
            providers: turbo_order(providers, turbo),
            pacing_override: None,
            premium_budget: None,
        }
    }

    /// Replace every provider's pacing delay
    pub fn with_pacing_override(mut self, pacing: Option<Duration>) -> Self {
        self.pacing_override = pacing;
        self
    }

    /// Limit premium-provider calls; `None` is unlimited
    pub fn with_premium_budget(mut self, limit: Option<u64>) -> Self {
        self.premium_budget = limit.map(PremiumBudget::new);
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Premium calls left, if a budget is set
    pub fn premium_budget_remaining(&self) -> Option<u64> {
        self.premium_budget.as_ref().map(|b| b.remaining())
    }

    /// Try each provider in order; first success wins
    ///
    /// Every call is followed by that provider's pacing delay, whatever the
    /// outcome. Never fails: when nothing matches the result is `NotFound`.
    pub async fn geocode(&self, code: &PostalCode) -> GeocodeResult {
        for provider in &self.providers {
            let name = provider.name();

            if provider.is_premium() {
                if let Some(budget) = &self.premium_budget {
                    if !budget.try_spend() {
                        debug!(provider = name, postal_code = %code, "Premium budget exhausted, skipping");
                        continue;
                    }
                }
            }

            debug!(provider = name, postal_code = %code, "Querying provider");
            let outcome = provider.geocode(code).await;

            let pacing = self.pacing_override.unwrap_or_else(|| provider.pacing());
            if !pacing.is_zero() {
                debug!("Pacing: waiting {:?} after {}", pacing, name);
                tokio::time::sleep(pacing).await;
            }

            match outcome {
                Ok(coords) => {
                    info!(
                        provider = name,
                        postal_code = %code,
                        latitude = %coords.latitude,
                        longitude = %coords.longitude,
                        "Geocoded postal code"
                    );
                    return GeocodeResult::found(coords, name);
                }
                Err(e) => {
                    debug!(provider = name, postal_code = %code, error = %e, "Provider miss");
                }
            }
        }

        GeocodeResult::NotFound
    }
}

/// Coordinate value that may be a JSON string or number
pub(crate) fn json_coordinate(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Stub providers for testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::{Coordinates, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Stub provider returning a fixed answer and counting calls
    pub struct StubProvider {
        pub name: &'static str,
        pub premium: bool,
        pub answer: Option<(&'static str, &'static str)>,
        pub pacing: Duration,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn found(name: &'static str, lat: &'static str, lon: &'static str) -> Self {
            Self {
                name,
                premium: false,
                answer: Some((lat, lon)),
                pacing: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn missing(name: &'static str) -> Self {
            Self {
                name,
                premium: false,
                answer: None,
                pacing: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn premium(mut self) -> Self {
            self.premium = true;
            self
        }

        pub fn with_pacing(mut self, pacing: Duration) -> Self {
            self.pacing = pacing;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodingProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_premium(&self) -> bool {
            self.premium
        }

        fn pacing(&self) -> Duration {
            self.pacing
        }

        async fn geocode(&self, code: &PostalCode) -> std::result::Result<Coordinates, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some((lat, lon)) => Coordinates::parse(lat, lon)
                    .ok_or_else(|| ProviderError::Parse("stub pair".to_string())),
                None => Err(ProviderError::NoMatch(code.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::StubProvider;
    use super::*;
    use std::time::Instant;

    fn code() -> PostalCode {
        PostalCode::parse("K1A0A6").unwrap()
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_success() {
        let first = Arc::new(StubProvider::missing("First"));
        let second = Arc::new(StubProvider::found("Second", "45.4215", "-75.6972"));
        let third = Arc::new(StubProvider::found("Third", "1.0", "1.0"));

        let chain = ProviderChain::new(vec![first.clone(), second.clone(), third.clone()], false);
        let result = chain.geocode(&code()).await;

        assert_eq!(result.provider(), Some("Second"));
        assert_eq!(result.to_field_pair(), "45.4215,-75.6972");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0, "Providers after the match must not run");
    }

    #[tokio::test]
    async fn test_all_missing_is_not_found() {
        let a = Arc::new(StubProvider::missing("A"));
        let b = Arc::new(StubProvider::missing("B"));
        let chain = ProviderChain::new(vec![a.clone(), b.clone()], false);

        assert_eq!(chain.geocode(&code()).await, GeocodeResult::NotFound);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_not_found() {
        let chain = ProviderChain::new(Vec::new(), true);
        assert!(chain.is_empty());
        assert_eq!(chain.geocode(&code()).await, GeocodeResult::NotFound);
    }

    #[test]
    fn test_turbo_moves_first_premium_to_front() {
        let providers: Vec<Arc<dyn GeocodingProvider>> = vec![
            Arc::new(StubProvider::missing("Nominatim")),
            Arc::new(StubProvider::missing("geocoder.ca")),
            Arc::new(StubProvider::missing("Google").premium()),
            Arc::new(StubProvider::missing("Mapbox").premium()),
        ];

        let chain = ProviderChain::new(providers, true);
        assert_eq!(
            chain.provider_names(),
            vec!["Google", "Nominatim", "geocoder.ca", "Mapbox"]
        );
    }

    #[test]
    fn test_turbo_without_premium_keeps_order() {
        let providers: Vec<Arc<dyn GeocodingProvider>> = vec![
            Arc::new(StubProvider::missing("Nominatim")),
            Arc::new(StubProvider::missing("geocoder.ca")),
        ];

        let chain = ProviderChain::new(providers, true);
        assert_eq!(chain.provider_names(), vec!["Nominatim", "geocoder.ca"]);
    }

    #[test]
    fn test_standard_order_when_turbo_off() {
        let providers: Vec<Arc<dyn GeocodingProvider>> = vec![
            Arc::new(StubProvider::missing("Nominatim")),
            Arc::new(StubProvider::missing("Google").premium()),
        ];

        let chain = ProviderChain::new(providers, false);
        assert_eq!(chain.provider_names(), vec!["Nominatim", "Google"]);
    }

    #[tokio::test]
    async fn test_premium_budget_skips_premium_when_spent() {
        let free = Arc::new(StubProvider::missing("Free"));
        let premium = Arc::new(StubProvider::missing("Premium").premium());

        let chain = ProviderChain::new(vec![free.clone(), premium.clone()], false)
            .with_premium_budget(Some(1));

        chain.geocode(&code()).await;
        chain.geocode(&code()).await;

        assert_eq!(free.calls(), 2);
        assert_eq!(premium.calls(), 1, "Second run must skip the premium provider");
        assert_eq!(chain.premium_budget_remaining(), Some(0));
    }

    #[tokio::test]
    async fn test_pacing_applied_after_each_call() {
        let a = Arc::new(StubProvider::missing("A").with_pacing(Duration::from_millis(150)));
        let b = Arc::new(StubProvider::found("B", "45.0", "-75.0").with_pacing(Duration::from_millis(150)));
        let chain = ProviderChain::new(vec![a, b], false);

        let start = Instant::now();
        let result = chain.geocode(&code()).await;

        assert!(result.is_found());
        assert!(start.elapsed() >= Duration::from_millis(280), "Both the miss and the hit are paced");
    }

    #[tokio::test]
    async fn test_pacing_override_replaces_provider_delay() {
        let slow = Arc::new(StubProvider::missing("Slow").with_pacing(Duration::from_secs(30)));
        let chain = ProviderChain::new(vec![slow], false)
            .with_pacing_override(Some(Duration::from_millis(1)));

        let start = Instant::now();
        chain.geocode(&code()).await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_json_coordinate() {
        assert_eq!(json_coordinate(&serde_json::json!("45.1")), Some("45.1".to_string()));
        assert_eq!(json_coordinate(&serde_json::json!(45.25)), Some("45.25".to_string()));
        assert_eq!(json_coordinate(&serde_json::json!(null)), None);
    }
}
