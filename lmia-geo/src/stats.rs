//! Resolution statistics
//!
//! Counters live on a collector instance injected into the orchestrator, so
//! two orchestrators (e.g. in tests) never share counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Run counters
#[derive(Debug, Default)]
pub struct StatsCollector {
    cache_hits: AtomicU64,
    api_calls: AtomicU64,
    failed_lookups: AtomicU64,
    provider_hits: Mutex<BTreeMap<String, u64>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// One request entered the provider chain
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Every provider failed for one request
    pub fn record_failed_lookup(&self) {
        self.failed_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_hit(&self, provider: &str) {
        let mut hits = self
            .provider_hits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *hits.entry(provider.to_string()).or_insert(0) += 1;
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn failed_lookups(&self) -> u64 {
        self.failed_lookups.load(Ordering::Relaxed)
    }

    /// Combine the counters with the current store sizes
    pub fn snapshot(&self, cache_entries_total: usize, bogon_count: usize) -> StatsSnapshot {
        let provider_hits = self
            .provider_hits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        StatsSnapshot::new(
            cache_entries_total as u64,
            self.cache_hits(),
            self.api_calls(),
            self.failed_lookups(),
            bogon_count as u64,
            provider_hits,
        )
    }
}

/// Read-only view of the counters and store sizes
///
/// Display: "N cached postal codes, H cache hits, A API calls, F failed lookups, B bogons"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cache_entries_total: u64,
    pub cache_hits: u64,
    pub api_calls: u64,
    pub failed_lookups: u64,
    pub bogon_count: u64,
    /// Successful resolutions per provider
    pub provider_hits: BTreeMap<String, u64>,
    /// `(api_calls - failed_lookups) / api_calls`, `None` without API calls
    pub success_rate: Option<f64>,
    /// `cache_hits / (cache_hits + api_calls)`, `None` without lookups
    pub cache_hit_ratio: Option<f64>,
}

impl StatsSnapshot {
    pub fn new(
        cache_entries_total: u64,
        cache_hits: u64,
        api_calls: u64,
        failed_lookups: u64,
        bogon_count: u64,
        provider_hits: BTreeMap<String, u64>,
    ) -> Self {
        let success_rate = if api_calls == 0 {
            None
        } else {
            Some(api_calls.saturating_sub(failed_lookups) as f64 / api_calls as f64)
        };

        let lookups = cache_hits + api_calls;
        let cache_hit_ratio = if lookups == 0 {
            None
        } else {
            Some(cache_hits as f64 / lookups as f64)
        };

        Self {
            cache_entries_total,
            cache_hits,
            api_calls,
            failed_lookups,
            bogon_count,
            provider_hits,
            success_rate,
            cache_hit_ratio,
        }
    }

    pub fn display_string(&self) -> String {
        let mut lines = vec![format!(
            "{} cached postal codes, {} cache hits, {} API calls, {} failed lookups, {} bogons",
            self.cache_entries_total,
            self.cache_hits,
            self.api_calls,
            self.failed_lookups,
            self.bogon_count
        )];

        lines.push(format!(
            "API success rate: {}, cache hit ratio: {}",
            format_ratio(self.success_rate),
            format_ratio(self.cache_hit_ratio)
        ));

        if !self.provider_hits.is_empty() {
            let per_provider: Vec<String> = self
                .provider_hits
                .iter()
                .map(|(name, hits)| format!("{}={}", name, hits))
                .collect();
            lines.push(format!("Resolved by provider: {}", per_provider.join(", ")));
        }

        lines.join("\n")
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}
