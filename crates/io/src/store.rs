//! The Load/Save collaborator.
//!
//! A `Store` hands out whole-table snapshots stamped with a `Version` and
//! accepts whole-table replacements. A save names the version it was based
//! on; if storage moved on in between, the save is refused rather than
//! silently overwriting someone else's edits.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use keros_engine::{Schema, Table};
use parking_lot::Mutex;

use crate::csv::{self, CsvFormat};
use crate::error::StoreError;
use crate::version::Version;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: Table,
    pub version: Version,
}

pub trait Store {
    /// Human-readable name of the backing location, for messages.
    fn target(&self) -> String;

    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replace the stored table. All-or-nothing.
    fn save(&self, table: &Table, base: &Version) -> Result<Version, StoreError>;
}

// ---------------------------------------------------------------------------
// File-backed CSV
// ---------------------------------------------------------------------------

pub struct CsvStore {
    path: PathBuf,
    schema: Schema,
    read_only: bool,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self { path: path.into(), schema, read_only: false }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        std::fs::read(&self.path).map_err(|e| StoreError::Read {
            target: self.target(),
            message: e.to_string(),
        })
    }

    fn write_failure(&self, message: impl Into<String>) -> StoreError {
        StoreError::StorageWriteFailure { target: self.target(), message: message.into() }
    }

    /// Write to a sibling temp file, then rename over the original.
    fn replace_atomically(&self, content: &[u8]) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_failure(e.to_string()))?;
        tmp.write_all(content)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.write_failure(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_failure(e.error.to_string()))?;
        Ok(())
    }
}

impl Store for CsvStore {
    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        let bytes = self.read_bytes()?;
        let version = Version::of(&bytes);
        let (content, format) = CsvFormat::detect(bytes);
        let table = csv::read_table(&content, &self.schema).map_err(|message| StoreError::Read {
            target: self.target(),
            message,
        })?;
        log::debug!(
            "loaded {} rows ({} ragged, {} spacers) from {} ({}, {})",
            table.len(),
            table.ragged_rows().count(),
            table.spacer_count(),
            self.target(),
            format.encoding.name(),
            version.short()
        );
        Ok(Snapshot { table, version })
    }

    fn save(&self, table: &Table, base: &Version) -> Result<Version, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly { target: self.target() });
        }

        let current = self.read_bytes()?;
        let found = Version::of(&current);
        if &found != base {
            return Err(StoreError::VersionConflict {
                target: self.target(),
                expected: base.clone(),
                found,
            });
        }

        let (_, format) = CsvFormat::detect(current);
        let content = csv::write_table(table, format).map_err(|e| self.write_failure(e))?;
        self.replace_atomically(&content)?;

        let version = Version::of(&content);
        log::info!("wrote {} rows to {} ({})", table.len(), self.target(), version.short());
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process store holding CSV text. Stands in for the remote spreadsheet
/// connector in tests, including its failure modes.
pub struct MemoryStore {
    name: String,
    schema: Schema,
    content: Mutex<String>,
    fail_next_write: Mutex<Option<String>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, content: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            content: Mutex::new(content.into()),
            fail_next_write: Mutex::new(None),
            read_only: false,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Make the next `save` fail with `message` after the version check.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        *self.fail_next_write.lock() = Some(message.into());
    }

    pub fn content(&self) -> String {
        self.content.lock().clone()
    }

    /// Replace the stored text behind the caller's back, as another user would.
    pub fn overwrite(&self, content: impl Into<String>) {
        *self.content.lock() = content.into();
    }
}

impl Store for MemoryStore {
    fn target(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        let content = self.content.lock().clone();
        let version = Version::of(content.as_bytes());
        let table = csv::read_table(&content, &self.schema).map_err(|message| StoreError::Read {
            target: self.target(),
            message,
        })?;
        Ok(Snapshot { table, version })
    }

    fn save(&self, table: &Table, base: &Version) -> Result<Version, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly { target: self.target() });
        }

        let mut content = self.content.lock();
        let found = Version::of(content.as_bytes());
        if &found != base {
            return Err(StoreError::VersionConflict {
                target: self.target(),
                expected: base.clone(),
                found,
            });
        }
        if let Some(message) = self.fail_next_write.lock().take() {
            return Err(StoreError::StorageWriteFailure { target: self.target(), message });
        }

        let written = csv::write_table(table, CsvFormat::sniff(&content))
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()))
            .map_err(|message| StoreError::StorageWriteFailure { target: self.target(), message })?;
        *content = written;
        Ok(Version::of(content.as_bytes()))
    }
}

// ---------------------------------------------------------------------------
// Read cache
// ---------------------------------------------------------------------------

/// Read-through cache with a time-to-live. A save drops the cached snapshot
/// so the next load sees what was written.
///
/// Hits need a long-lived owner: a process that loads once gains nothing.
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    cached: Mutex<Option<(Instant, Snapshot)>>,
}

impl<S: Store> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self { inner, ttl, cached: Mutex::new(None) }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

impl<S: Store> Store for CachedStore<S> {
    fn target(&self) -> String {
        self.inner.target()
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        let mut cached = self.cached.lock();
        if let Some((at, snapshot)) = cached.as_ref() {
            if at.elapsed() < self.ttl {
                log::debug!("cache hit for {}", self.inner.target());
                return Ok(snapshot.clone());
            }
        }
        let snapshot = self.inner.load()?;
        *cached = Some((Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }

    fn save(&self, table: &Table, base: &Version) -> Result<Version, StoreError> {
        let result = self.inner.save(table, base);
        if result.is_ok() {
            self.invalidate();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTER: &str = "Area,Name\nKavos,L1\nSDS,L2\n";

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new("mem", REGISTER, Schema::new());
        let snap = store.load().unwrap();
        let v2 = store.save(&snap.table, &snap.version).unwrap();
        assert_eq!(v2, snap.version, "unchanged table writes identical bytes");
        assert_eq!(store.content(), REGISTER);
    }

    #[test]
    fn memory_store_rejects_stale_base() {
        let store = MemoryStore::new("mem", REGISTER, Schema::new());
        let snap = store.load().unwrap();
        store.overwrite("Area,Name\nKavos,L1\n");

        let err = store.save(&snap.table, &snap.version).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert_eq!(store.content(), "Area,Name\nKavos,L1\n");
    }

    #[test]
    fn failed_write_leaves_storage_alone() {
        let store = MemoryStore::new("mem", REGISTER, Schema::new());
        let mut snap = store.load().unwrap();
        snap.table.remove_keys(&[keros_engine::RowKey(0)].into_iter().collect());
        store.fail_next_write("quota exceeded");

        let err = store.save(&snap.table, &snap.version).unwrap_err();
        assert_eq!(
            err,
            StoreError::StorageWriteFailure { target: "mem".into(), message: "quota exceeded".into() }
        );
        assert_eq!(store.content(), REGISTER);

        // Retry with the same in-memory edits succeeds
        store.save(&snap.table, &snap.version).unwrap();
        assert_eq!(store.content(), "Area,Name\nSDS,L2\n");
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let store = MemoryStore::new("archive", REGISTER, Schema::new()).read_only(true);
        let snap = store.load().unwrap();
        assert_eq!(
            store.save(&snap.table, &snap.version).unwrap_err(),
            StoreError::ReadOnly { target: "archive".into() }
        );
    }

    #[test]
    fn cache_serves_until_save() {
        let store = CachedStore::new(MemoryStore::new("mem", REGISTER, Schema::new()), Duration::from_secs(600));
        let first = store.load().unwrap();

        store.inner().overwrite("Area,Name\nKonakia,L9\n");
        let cached = store.load().unwrap();
        assert_eq!(cached.version, first.version, "within ttl the cached snapshot is served");

        store.invalidate();
        let fresh = store.load().unwrap();
        assert_eq!(fresh.table.len(), 1);

        store.save(&fresh.table, &fresh.version).unwrap();
        assert!(store.cached.lock().is_none());
    }

    #[test]
    fn zero_ttl_always_reloads() {
        let store = CachedStore::new(MemoryStore::new("mem", REGISTER, Schema::new()), Duration::ZERO);
        store.load().unwrap();
        store.inner().overwrite("Area,Name\n");
        assert!(store.load().unwrap().table.is_empty());
    }
}
