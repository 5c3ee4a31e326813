//! Report annotation
//!
//! Caller side of the orchestrator: extracts a postal code from each record,
//! resolves it, writes `postal_code,latitude,longitude` onto the record and
//! inserts a cache row whenever a provider (not the cache) answered.
//!
//! Reports are plain comma CSV with a header row, read and written in the
//! same dialect.

use crate::orchestrator::{AddressResolution, GeocodeOrchestrator};
use crate::postal_code::{self, PostalCode};
use crate::types::{GeocodeResult, CACHE_PROVIDER};
use lmia_common::{Error, Result};
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Columns appended to every annotated record
pub const ANNOTATION_COLUMNS: [&str; 3] = ["postal_code", "latitude", "longitude"];

/// Which report columns feed the lookup
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub address_column: String,
    /// Records get the `Unknown` placeholder employer when absent
    pub employer_column: Option<String>,
}

/// Per-run annotation counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateSummary {
    pub rows: u64,
    pub resolved: u64,
    pub unresolved: u64,
    /// Records whose address held no postal code
    pub without_postal_code: u64,
    /// Cache rows written during this run
    pub cached: u64,
}

impl AnnotateSummary {
    pub fn display_string(&self) -> String {
        format!(
            "{} rows annotated: {} resolved, {} unresolved, {} without postal code, {} newly cached",
            self.rows, self.resolved, self.unresolved, self.without_postal_code, self.cached
        )
    }
}

/// Insert a provider answer into the cache
///
/// Cache answers and misses are ignored, as is any code on the bogon list.
/// Returns `true` when a row was written.
pub fn record_resolution(
    orchestrator: &GeocodeOrchestrator,
    code: &PostalCode,
    result: &GeocodeResult,
    address: &str,
    employer: &str,
) -> Result<bool> {
    match result {
        GeocodeResult::Found {
            latitude,
            longitude,
            provider,
        } if provider != CACHE_PROVIDER => {
            if orchestrator.bogons().is_bogon(code) {
                warn!(postal_code = %code, provider = %provider, "Refusing to cache a bogon");
                return Ok(false);
            }
            orchestrator
                .cache()
                .insert(code, latitude, longitude, address, employer)
        }
        _ => Ok(false),
    }
}

/// End-of-run statistics, printed to stderr by every resolving command
pub fn run_summary(orchestrator: &GeocodeOrchestrator) -> String {
    orchestrator.stats_snapshot().display_string()
}

/// Resolve a postal code or an address and cache a fresh answer
///
/// `input` is tried as a bare postal code first, then searched as an
/// address. The cache row uses `address` when given, else `input`.
pub async fn lookup_and_record(
    orchestrator: &GeocodeOrchestrator,
    input: &str,
    address: Option<&str>,
    employer: Option<&str>,
) -> Result<AddressResolution> {
    let code = PostalCode::parse(input).or_else(|| postal_code::extract(input));

    let Some(code) = code else {
        debug!(input, "No postal code in lookup input");
        return Ok(AddressResolution {
            postal_code: None,
            result: GeocodeResult::NotFound,
        });
    };

    let result = orchestrator.resolve_code(&code).await?;
    record_resolution(
        orchestrator,
        &code,
        &result,
        address.unwrap_or(input),
        employer.unwrap_or_default(),
    )?;

    Ok(AddressResolution {
        postal_code: Some(code),
        result,
    })
}

/// Annotate every record of a CSV report
///
/// # Errors
/// - `InvalidInput` when the report is malformed or a named column is missing
/// - `Persistence` when the cache or bogon list cannot be written
pub async fn annotate_report<R: Read, W: Write>(
    orchestrator: &GeocodeOrchestrator,
    input: R,
    output: W,
    options: &AnnotateOptions,
) -> Result<AnnotateSummary> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let mut writer = csv::Writer::from_writer(output);

    let headers = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Report header: {}", e)))?
        .clone();

    let address_idx = column_index(&headers, &options.address_column)?;
    let employer_idx = options
        .employer_column
        .as_deref()
        .map(|name| column_index(&headers, name))
        .transpose()?;

    let mut out_headers = headers.clone();
    for column in ANNOTATION_COLUMNS {
        out_headers.push_field(column);
    }
    writer.write_record(&out_headers).map_err(write_error)?;

    let mut summary = AnnotateSummary::default();

    for record in reader.records() {
        let record =
            record.map_err(|e| Error::InvalidInput(format!("Report record: {}", e)))?;
        summary.rows += 1;

        let address = record.get(address_idx).unwrap_or_default();
        let employer = employer_idx
            .and_then(|idx| record.get(idx))
            .unwrap_or_default();

        let resolution = orchestrator.resolve_address(address).await?;

        let mut annotated = record.clone();
        match &resolution.postal_code {
            Some(code) => {
                if record_resolution(orchestrator, code, &resolution.result, address, employer)? {
                    summary.cached += 1;
                }
                annotated.push_field(code.as_str());
            }
            None => {
                summary.without_postal_code += 1;
                annotated.push_field("");
            }
        }

        match resolution.result.coordinates() {
            Some((latitude, longitude)) => {
                summary.resolved += 1;
                annotated.push_field(latitude);
                annotated.push_field(longitude);
            }
            None => {
                if resolution.postal_code.is_some() {
                    summary.unresolved += 1;
                }
                annotated.push_field("");
                annotated.push_field("");
            }
        }

        writer.write_record(&annotated).map_err(write_error)?;
    }

    writer.flush()?;

    info!(
        rows = summary.rows,
        resolved = summary.resolved,
        unresolved = summary.unresolved,
        cached = summary.cached,
        "Report annotated"
    );

    Ok(summary)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| Error::InvalidInput(format!("Report has no column named '{}'", name)))
}

fn write_error(e: csv::Error) -> Error {
    Error::Persistence(format!("Writing annotated report: {}", e))
}
