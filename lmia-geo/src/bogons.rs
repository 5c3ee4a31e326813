//! Bogon store
//!
//! Postal codes that every provider failed to resolve. One canonical code per
//! line, append-only; a code leaves the list only through [`BogonStore::forgive`].

use crate::postal_code::PostalCode;
use lmia_common::{Error, Result};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Set of permanently unresolvable postal codes
pub struct BogonStore {
    path: PathBuf,
    codes: Mutex<HashSet<PostalCode>>,
}

impl BogonStore {
    /// Open the store, loading the list if it exists
    ///
    /// Blank lines and lines that are not postal codes are ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut codes = HashSet::new();

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match PostalCode::parse(line) {
                        Some(code) => {
                            codes.insert(code);
                        }
                        None => warn!(path = %path.display(), line, "Invalid bogon line ignored"),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Bogon list not found, starting empty");
            }
            Err(e) => return Err(persistence_error(&path, e)),
        }

        info!(path = %path.display(), bogons = codes.len(), "Bogon list loaded");

        Ok(Self {
            path,
            codes: Mutex::new(codes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty list file if none exists
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.lock();
        self.ensure_parent()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence_error(&self.path, e))?;
        Ok(())
    }

    pub fn is_bogon(&self, code: &PostalCode) -> bool {
        self.lock().contains(code)
    }

    /// Record a permanent failure; no-op if already listed
    ///
    /// Returns `true` when the code was appended.
    pub fn mark_bogon(&self, code: &PostalCode) -> Result<bool> {
        let mut codes = self.lock();
        if codes.contains(code) {
            return Ok(false);
        }

        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence_error(&self.path, e))?;
        writeln!(file, "{}", code).map_err(|e| persistence_error(&self.path, e))?;

        codes.insert(code.clone());
        info!(postal_code = %code, "Marked postal code as bogon");
        Ok(true)
    }

    /// Remove a code so it will be retried (manual reset)
    ///
    /// Rewrites the list through a temp file and rename. Returns `false` if
    /// the code was not listed.
    pub fn forgive(&self, code: &PostalCode) -> Result<bool> {
        let mut codes = self.lock();
        if !codes.contains(code) {
            return Ok(false);
        }

        let mut remaining: Vec<&PostalCode> = codes.iter().filter(|c| *c != code).collect();
        remaining.sort();
        let content: String = remaining.iter().map(|c| format!("{}\n", c)).collect();

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content).map_err(|e| persistence_error(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| persistence_error(&self.path, e))?;

        codes.remove(code);
        info!(postal_code = %code, "Removed postal code from bogon list");
        Ok(true)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PostalCode>> {
        self.codes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| persistence_error(&self.path, e))?;
            }
        }
        Ok(())
    }
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code(s: &str) -> PostalCode {
        PostalCode::parse(s).unwrap()
    }

    #[test]
    fn test_mark_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogons.txt");
        let store = BogonStore::open(&path).unwrap();

        assert!(store.mark_bogon(&code("Z9Z9Z9")).unwrap());
        assert!(!store.mark_bogon(&code("Z9Z9Z9")).unwrap());

        assert_eq!(store.count(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Z9Z9Z9\n");
    }

    #[test]
    fn test_reload_ignores_junk_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogons.txt");
        std::fs::write(&path, "Z9Z9Z9\n\n  \nnot a code\nX0X 0X0\n").unwrap();

        let store = BogonStore::open(&path).unwrap();
        assert_eq!(store.count(), 2);
        assert!(store.is_bogon(&code("Z9Z9Z9")));
        assert!(store.is_bogon(&code("X0X0X0")));
    }

    #[test]
    fn test_forgive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogons.txt");
        let store = BogonStore::open(&path).unwrap();
        store.mark_bogon(&code("Z9Z9Z9")).unwrap();
        store.mark_bogon(&code("X0X0X0")).unwrap();

        assert!(store.forgive(&code("Z9Z9Z9")).unwrap());
        assert!(!store.forgive(&code("Z9Z9Z9")).unwrap());
        assert!(!store.is_bogon(&code("Z9Z9Z9")));

        let reopened = BogonStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 1);
        assert!(reopened.is_bogon(&code("X0X0X0")));
    }

    #[test]
    fn test_initialize_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("bogons.txt");
        let store = BogonStore::open(&path).unwrap();

        store.initialize().unwrap();
        store.initialize().unwrap();

        assert!(path.exists());
        assert_eq!(store.count(), 0);
    }
}
