//! Location cache
//!
//! Durable postal code → coordinates map. The table is semicolon-delimited
//! with a header row:
//!
//! ```text
//! postal_code;latitude;longitude;address;employer
//! B0J2C0;44.3698843;-64.2836766;PO Box219, Lunenburg, NS B0J2C0;Cilantro, The Cooks Shop Inc
//! ```
//!
//! Addresses are full of commas and practically never contain semicolons, so
//! fields are written bare. A field that does contain `;`, `"` or a line break
//! gets standard CSV quoting (wrapped, inner quotes doubled); that is the only
//! quoting rule used anywhere in the file.
//!
//! The whole table is loaded into a `HashMap` at open. Entries are
//! write-once: the first insert for a code wins and later inserts are no-ops.

use crate::postal_code::PostalCode;
use lmia_common::text::sanitize_field;
use lmia_common::{Error, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Column delimiter of the cache table
pub const DELIMITER: u8 = b';';

/// Header row of the cache table
pub const HEADER: [&str; 5] = ["postal_code", "latitude", "longitude", "address", "employer"];

/// One cached resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub postal_code: PostalCode,
    pub latitude: String,
    pub longitude: String,
    /// A sample address that carried this postal code
    pub address: String,
    /// A sample employer at that address
    pub employer: String,
}

struct CacheInner {
    index: HashMap<PostalCode, CacheEntry>,
    writer: Option<csv::Writer<File>>,
}

/// Read-through, write-once postal code cache backed by a delimited table
pub struct LocationCache {
    path: PathBuf,
    inner: Mutex<CacheInner>,
}

impl LocationCache {
    /// Open the cache, loading the table if it exists
    ///
    /// A missing file is an empty cache; it is created by [`initialize`] or by
    /// the first insert. Malformed rows are skipped with a warning, and for a
    /// code that appears twice the first row is kept.
    ///
    /// [`initialize`]: LocationCache::initialize
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = if path.exists() {
            load_table(&path)?
        } else {
            debug!(path = %path.display(), "Cache table not found, starting empty");
            HashMap::new()
        };

        info!(path = %path.display(), entries = index.len(), "Location cache loaded");

        Ok(Self {
            path,
            inner: Mutex::new(CacheInner {
                index,
                writer: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table with its header if it does not exist yet
    ///
    /// An existing table is left untouched. An existing but empty file only
    /// gets the header row.
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.lock();
        self.ensure_table()
    }

    /// Exact-match lookup by canonical postal code
    pub fn lookup(&self, code: &PostalCode) -> Option<CacheEntry> {
        self.lock().index.get(code).cloned()
    }

    pub fn contains(&self, code: &PostalCode) -> bool {
        self.lock().index.contains_key(code)
    }

    /// Insert a resolution unless the code is already cached
    ///
    /// Returns `true` when a row was written. Address and employer are
    /// sanitized before storage. Write failures are returned as errors and
    /// leave the in-memory index unchanged.
    ///
    /// The caller must not insert a code that is on the bogon list; a code is
    /// never both cached and a bogon. [`crate::annotate::record_resolution`]
    /// checks this before writing.
    pub fn insert(
        &self,
        code: &PostalCode,
        latitude: &str,
        longitude: &str,
        address: &str,
        employer: &str,
    ) -> Result<bool> {
        let mut inner = self.lock();

        if inner.index.contains_key(code) {
            debug!(postal_code = %code, "Already cached, keeping first entry");
            return Ok(false);
        }

        let entry = CacheEntry {
            postal_code: code.clone(),
            latitude: latitude.trim().to_string(),
            longitude: longitude.trim().to_string(),
            address: sanitize_field(address),
            employer: sanitize_field(employer),
        };

        if inner.writer.is_none() {
            self.ensure_table()?;
            let file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| persistence_error(&self.path, e))?;
            inner.writer = Some(table_writer(file));
        }

        if let Some(writer) = inner.writer.as_mut() {
            writer
                .write_record([
                    entry.postal_code.as_str(),
                    entry.latitude.as_str(),
                    entry.longitude.as_str(),
                    entry.address.as_str(),
                    entry.employer.as_str(),
                ])
                .map_err(|e| persistence_error(&self.path, e))?;
            writer
                .flush()
                .map_err(|e| persistence_error(&self.path, e))?;
        }

        debug!(
            postal_code = %code,
            latitude = %entry.latitude,
            longitude = %entry.longitude,
            "Cached location"
        );
        inner.index.insert(code.clone(), entry);
        Ok(true)
    }

    /// Number of cached postal codes
    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, ordered by postal code
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.lock().index.values().cloned().collect();
        entries.sort_by(|a, b| a.postal_code.cmp(&b.postal_code));
        entries
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Caller holds the lock
    fn ensure_table(&self) -> Result<()> {
        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(persistence_error(&self.path, e)),
        };

        if !needs_header {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| persistence_error(&self.path, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence_error(&self.path, e))?;
        let mut writer = table_writer(file);
        writer
            .write_record(HEADER)
            .map_err(|e| persistence_error(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| persistence_error(&self.path, e))?;

        info!(path = %self.path.display(), "Created location cache table");
        Ok(())
    }
}

fn table_writer(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(csv::QuoteStyle::Necessary)
        .has_headers(false)
        .from_writer(file)
}

fn load_table(path: &Path) -> Result<HashMap<PostalCode, CacheEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| persistence_error(path, e))?;

    let mut index = HashMap::new();
    let mut skipped = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), row, error = %e, "Unreadable cache row skipped");
                skipped += 1;
                continue;
            }
        };

        if row == 0 && record.get(0) == Some(HEADER[0]) {
            continue;
        }

        if record.len() != HEADER.len() {
            warn!(path = %path.display(), row, fields = record.len(), "Malformed cache row skipped");
            skipped += 1;
            continue;
        }

        let Some(code) = PostalCode::parse(&record[0]) else {
            warn!(path = %path.display(), row, value = &record[0], "Invalid postal code in cache skipped");
            skipped += 1;
            continue;
        };

        index.entry(code.clone()).or_insert_with(|| CacheEntry {
            postal_code: code,
            latitude: record[1].to_string(),
            longitude: record[2].to_string(),
            address: record[3].to_string(),
            employer: record[4].to_string(),
        });
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Cache table contained unusable rows");
    }

    Ok(index)
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("{}: {}", path.display(), e))
}
