//! Content-addressed response storage.
//!
//! The gateway only talks to [`ResponseCache`]; the backing store decides how
//! entries are kept and synchronized. Nothing here evicts or expires entries.

mod disk;
mod memory;

use async_trait::async_trait;
use serde_json::value::RawValue;

use crate::hasher::CacheKey;

pub use disk::DiskCache;
pub use memory::MemoryCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache entry {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable map from [`CacheKey`] to the downstream response body.
///
/// Implementations must tolerate concurrent readers and writers; callers do
/// not serialize access. Writing an existing key replaces its value.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn contains(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Returns `None` when nothing was stored under `key`. The body comes back
    /// byte for byte as it was stored.
    async fn get(&self, key: &CacheKey) -> Result<Option<Box<RawValue>>, CacheError>;

    /// `model` is kept as entry metadata only; it is never returned by `get`.
    async fn put(&self, key: &CacheKey, model: &str, response: &RawValue) -> Result<(), CacheError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
