//! Geocoding orchestrator
//!
//! Public entry point for resolving one postal code:
//!
//! ```text
//! CacheCheck → BogonCheck → ProviderChain → Resolved | Exhausted
//! ```
//!
//! - Cache hit: counted, returned at once (no network, no pacing)
//! - Bogon: `NotFound` at once (no network, no pacing)
//! - Provider chain: counted once per request, not per provider
//! - Exhausted: counted as a failed lookup and added to the bogon list
//!
//! The orchestrator never writes the cache. A cache row needs a sample
//! address and employer that only the caller has, so callers insert into
//! [`LocationCache`] themselves after receiving `Found`.

use crate::bogons::BogonStore;
use crate::cache::LocationCache;
use crate::config::GeocoderSettings;
use crate::postal_code::{self, PostalCode};
use crate::providers::{chain_from_settings, ProviderChain};
use crate::stats::{StatsCollector, StatsSnapshot};
use crate::types::{GeocodeResult, CACHE_PROVIDER};
use lmia_common::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Postal code extracted from an address together with its resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResolution {
    /// `None` when the address holds no postal code
    pub postal_code: Option<PostalCode>,
    pub result: GeocodeResult,
}

pub struct GeocodeOrchestrator {
    cache: Arc<LocationCache>,
    bogons: Arc<BogonStore>,
    chain: ProviderChain,
    stats: Arc<StatsCollector>,
    /// One resolution at a time
    serial: Mutex<()>,
}

impl GeocodeOrchestrator {
    pub fn new(
        cache: Arc<LocationCache>,
        bogons: Arc<BogonStore>,
        chain: ProviderChain,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            cache,
            bogons,
            chain,
            stats,
            serial: Mutex::new(()),
        }
    }

    /// Open the stores and build the provider chain from settings
    pub fn from_settings(settings: &GeocoderSettings) -> Result<Self> {
        let cache = Arc::new(LocationCache::open(&settings.cache_file)?);
        let bogons = Arc::new(BogonStore::open(&settings.bogon_file)?);
        let chain = chain_from_settings(settings)?;

        Ok(Self::new(cache, bogons, chain, Arc::new(StatsCollector::new())))
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }

    pub fn bogons(&self) -> &BogonStore {
        &self.bogons
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Resolve a postal code given as text (either form)
    ///
    /// Empty or malformed input is `NotFound` without touching any counter.
    pub async fn resolve(&self, postal_code: &str) -> Result<GeocodeResult> {
        if postal_code.trim().is_empty() {
            return Ok(GeocodeResult::NotFound);
        }

        match PostalCode::parse(postal_code) {
            Some(code) => self.resolve_code(&code).await,
            None => {
                warn!(input = postal_code, "Not a postal code, skipping lookup");
                Ok(GeocodeResult::NotFound)
            }
        }
    }

    /// Resolve a canonical postal code
    ///
    /// # Errors
    /// Only persistence failures (bogon list unwritable) are errors; every
    /// provider failure is folded into `NotFound`.
    pub async fn resolve_code(&self, code: &PostalCode) -> Result<GeocodeResult> {
        let _serial = self.serial.lock().await;

        // CacheCheck
        if let Some(entry) = self.cache.lookup(code) {
            self.stats.record_cache_hit();
            debug!(postal_code = %code, "Cache hit");
            return Ok(GeocodeResult::Found {
                latitude: entry.latitude,
                longitude: entry.longitude,
                provider: CACHE_PROVIDER.to_string(),
            });
        }

        // BogonCheck
        if self.bogons.is_bogon(code) {
            debug!(postal_code = %code, "Known bogon, skipping providers");
            return Ok(GeocodeResult::NotFound);
        }

        // ProviderChain
        self.stats.record_api_call();
        let result = self.chain.geocode(code).await;

        match &result {
            GeocodeResult::Found { provider, .. } => {
                self.stats.record_provider_hit(provider);
            }
            GeocodeResult::NotFound => {
                self.stats.record_failed_lookup();
                self.bogons.mark_bogon(code)?;
                info!(
                    postal_code = %code,
                    providers = self.chain.len(),
                    "All providers failed, recorded as bogon"
                );
            }
        }

        Ok(result)
    }

    /// Extract the postal code from an address and resolve it
    pub async fn resolve_address(&self, address: &str) -> Result<AddressResolution> {
        let Some(code) = postal_code::extract(address) else {
            debug!(address, "No postal code in address");
            return Ok(AddressResolution {
                postal_code: None,
                result: GeocodeResult::NotFound,
            });
        };

        let result = self.resolve_code(&code).await?;
        Ok(AddressResolution {
            postal_code: Some(code),
            result,
        })
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.cache.len(), self.bogons.count())
    }
}
