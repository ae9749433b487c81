// Row caching keyed by the array-shaped data URL

use crate::data::{Row, RowSource};
use crate::error::RowSourceError;
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Longest file name we are willing to derive from a URL
const MAX_FILE_NAME: usize = 200;

/// Persistent key/value row cache stored as one JSON file per URL
#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Cache under the platform cache directory for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not determine cache directory"))?
            .join(app_name);
        Ok(Self { cache_dir })
    }

    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File holding the rows for a URL; `None` when the URL is too long to map to a name
    pub fn cache_file(&self, url: &str) -> Option<PathBuf> {
        let name: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        if name.len() > MAX_FILE_NAME {
            return None;
        }
        Some(self.cache_dir.join(format!("{}.json", name)))
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir).with_context(|| {
                format!("Failed to create cache directory {}", self.cache_dir.display())
            })?;
        }
        Ok(())
    }

    pub fn load(&self, url: &str) -> Result<Option<Vec<Row>>> {
        let Some(path) = self.cache_file(url) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file {}", path.display()))?;
        let rows = serde_json::from_str(&text)
            .with_context(|| format!("Corrupt cache file {}", path.display()))?;
        Ok(Some(rows))
    }

    pub fn store(&self, url: &str, rows: &[Row]) -> Result<()> {
        let Some(path) = self.cache_file(url) else {
            debug!("URL too long to cache on disk: {}", url);
            return Ok(());
        };
        self.ensure_cache_dir()?;
        let text = serde_json::to_string(rows).context("Failed to serialize rows")?;
        fs::write(&path, text)
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;
        Ok(())
    }

    /// Remove every cached row file
    pub fn clear_all(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Could not remove cache file {}: {}", path.display(), e);
                }
            }
        }
        Ok(())
    }
}

/// Wraps a row source with an in-session memory cache and an optional disk cache
pub struct CachedRowSource<S> {
    inner: S,
    memory: RefCell<HashMap<String, Vec<Row>>>,
    disk: Option<DiskCache>,
}

impl<S: RowSource> CachedRowSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            memory: RefCell::new(HashMap::new()),
            disk: None,
        }
    }

    pub fn with_disk_cache(mut self, disk: DiskCache) -> Self {
        self.disk = Some(disk);
        self
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.memory.borrow().contains_key(url)
    }

    fn from_disk(&self, url: &str) -> Option<Vec<Row>> {
        let disk = self.disk.as_ref()?;
        match disk.load(url) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Ignoring unreadable cache entry for {}: {:#}", url, e);
                None
            }
        }
    }
}

impl<S: RowSource> RowSource for CachedRowSource<S> {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        if let Some(rows) = self.memory.borrow().get(url) {
            debug!("Serving {} rows for {} from memory", rows.len(), url);
            return Ok(rows.clone());
        }

        if let Some(rows) = self.from_disk(url) {
            info!("Loaded {} rows from cache, for {}", rows.len(), url);
            self.memory.borrow_mut().insert(url.to_string(), rows.clone());
            return Ok(rows);
        }

        let rows = self.inner.fetch_rows(url)?;
        info!("Caching {} rows from {}", rows.len(), url);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.store(url, &rows) {
                warn!("Could not cache rows for {}: {:#}", url, e);
            }
        }
        self.memory.borrow_mut().insert(url.to_string(), rows.clone());
        Ok(rows)
    }
}
