use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{CacheError, ResponseCache};
use crate::hasher::CacheKey;

const SCRATCH_DIR: &str = "tmp";

// On-disk layout of one entry: <cache_dir>/<key>.json
// `response` is embedded as the exact text Ollama sent.
#[derive(Deserialize)]
struct StoredEntry {
    model: String,
    cached_at: DateTime<Utc>,
    response: Box<RawValue>,
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    model: &'a str,
    cached_at: DateTime<Utc>,
    response: &'a RawValue,
}

/// Directory backed cache that survives restarts.
///
/// Each entry is a JSON file named after its key. Writes land in a scratch
/// file first and are renamed into place, so a reader sees either the old
/// file, the new file, or nothing.
pub struct DiskCache {
    dir: PathBuf,
    scratch_dir: PathBuf,
    index: DashSet<CacheKey>,
    scratch_seq: AtomicU64,
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl DiskCache {
    /// Creates the directory if needed and indexes the entries already in it.
    /// Scratch files left behind by an interrupted write are removed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        let scratch_dir = dir.join(SCRATCH_DIR);
        fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|e| io_error(&scratch_dir, e))?;
        Self::clear_scratch(&scratch_dir).await?;

        let index = DashSet::new();
        let mut listing = fs::read_dir(&dir).await.map_err(|e| io_error(&dir, e))?;
        while let Some(entry) = listing.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(CacheKey::parse)
            {
                index.insert(key);
            }
        }

        tracing::debug!(dir = %dir.display(), entries = index.len(), "disk cache opened");

        Ok(Self {
            dir,
            scratch_dir,
            index,
            scratch_seq: AtomicU64::new(0),
        })
    }

    async fn clear_scratch(scratch_dir: &Path) -> Result<(), CacheError> {
        let mut listing = fs::read_dir(scratch_dir)
            .await
            .map_err(|e| io_error(scratch_dir, e))?;
        while let Some(entry) = listing
            .next_entry()
            .await
            .map_err(|e| io_error(scratch_dir, e))?
        {
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale scratch file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn scratch_path(&self, key: &CacheKey) -> PathBuf {
        // Concurrent writers of the same key each get their own scratch file.
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!("{key}.{seq}.tmp"))
    }

    async fn write_scratch(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl ResponseCache for DiskCache {
    async fn contains(&self, key: &CacheKey) -> Result<bool, CacheError> {
        if self.index.contains(key) {
            return Ok(true);
        }
        let path = self.entry_path(key);
        let exists = fs::try_exists(&path).await.map_err(|e| io_error(&path, e))?;
        if exists {
            self.index.insert(key.clone());
        }
        Ok(exists)
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Box<RawValue>>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.index.remove(key);
                return Ok(None);
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        let entry: StoredEntry =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })?;
        self.index.insert(key.clone());

        tracing::debug!(
            %key,
            model = %entry.model,
            age_secs = (Utc::now() - entry.cached_at).num_seconds(),
            "disk cache entry read"
        );
        Ok(Some(entry.response))
    }

    async fn put(&self, key: &CacheKey, model: &str, response: &RawValue) -> Result<(), CacheError> {
        let entry = StoredEntryRef {
            model,
            cached_at: Utc::now(),
            response,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;

        let scratch = self.scratch_path(key);
        if let Err(e) = Self::write_scratch(&scratch, &bytes).await {
            let _ = fs::remove_file(&scratch).await;
            return Err(io_error(&scratch, e));
        }

        let target = self.entry_path(key);
        if let Err(e) = fs::rename(&scratch, &target).await {
            let _ = fs::remove_file(&scratch).await;
            return Err(io_error(&target, e));
        }

        self.index.insert(key.clone());
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
