//! lmia-geo library interface
//!
//! Postal-code geocoding for LMIA employer records: extraction, the
//! location cache and bogon list, the external provider chain and the
//! orchestrator that ties them together.

pub mod annotate;
pub mod bogons;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod postal_code;
pub mod providers;
pub mod stats;
pub mod types;

pub use crate::bogons::BogonStore;
pub use crate::cache::{CacheEntry, LocationCache};
pub use crate::config::{resolve_settings, CliOverrides, GeocoderSettings};
pub use crate::orchestrator::{AddressResolution, GeocodeOrchestrator};
pub use crate::postal_code::{extract, PostalCode};
pub use crate::providers::ProviderChain;
pub use crate::stats::{StatsCollector, StatsSnapshot};
pub use crate::types::{Coordinates, GeocodeResult, GeocodingProvider, ProviderError};
