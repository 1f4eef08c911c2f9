//! Explicit caching of loaded tables.
//!
//! Entries are keyed by the loader's `(id, version)`. A cache never decides
//! freshness on its own; bumping the loader version is the only invalidation.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use polars::prelude::{DataFrame, IpcReader, IpcWriter, SerReader, SerWriter};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info_span};

use crate::error::{CohortError, Result};
use crate::loader::TableLoader;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: String,
    pub version: u32,
}

impl CacheKey {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    pub fn of(loader: &dyn TableLoader) -> Self {
        Self::new(loader.id(), loader.version())
    }

    /// Lowercase hex SHA-256 of `"{id}@v{version}"`.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.id, self.version)
    }
}

pub trait TableCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<DataFrame>>;

    fn put(&self, key: &CacheKey, table: &DataFrame) -> Result<()>;
}

/// Load through `cache`: a hit skips the loader, a miss loads and stores.
pub fn load_cached(cache: &dyn TableCache, loader: &dyn TableLoader) -> Result<DataFrame> {
    let key = CacheKey::of(loader);
    let span = info_span!("load_table", table = %key);
    let _guard = span.enter();

    if let Some(table) = cache.get(&key)? {
        debug!(rows = table.height(), "cache hit");
        return Ok(table);
    }
    let table = loader.load()?;
    cache.put(&key, &table)?;
    debug!(rows = table.height(), "cache miss, stored");
    Ok(table)
}

/// Always loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl TableCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<DataFrame>> {
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _table: &DataFrame) -> Result<()> {
        Ok(())
    }
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    tables: RwLock<HashMap<CacheKey, DataFrame>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TableCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<DataFrame>> {
        Ok(self
            .tables
            .read()
            .ok()
            .and_then(|tables| tables.get(key).cloned()))
    }

    fn put(&self, key: &CacheKey, table: &DataFrame) -> Result<()> {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(key.clone(), table.clone());
        }
        Ok(())
    }
}

/// Arrow IPC files under one directory, one file per key digest.
///
/// Entries are written to a temporary file in the same directory and renamed
/// into place, so a failed write never leaves a partial entry behind.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.arrow", key.digest()))
    }
}

impl TableCache for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<DataFrame>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| CohortError::cache_io("open", &path, e))?;
        Ok(Some(IpcReader::new(file).finish()?))
    }

    fn put(&self, key: &CacheKey, table: &DataFrame) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| CohortError::cache_io("create directory", &self.dir, e))?;
        let path = self.path_for(key);
        let mut staged = NamedTempFile::new_in(&self.dir)
            .map_err(|e| CohortError::cache_io("create", &self.dir, e))?;
        let mut table = table.clone();
        IpcWriter::new(staged.as_file_mut()).finish(&mut table)?;
        staged
            .persist(&path)
            .map_err(|e| CohortError::cache_io("rename", &path, e.error))?;
        Ok(())
    }
}
