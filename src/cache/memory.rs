use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::value::RawValue;

use super::{CacheError, ResponseCache};
use crate::hasher::CacheKey;

// Cache entry with timestamp
#[derive(Clone)]
struct CacheEntry {
    response: Box<RawValue>,
    model: String,
    cached_at: DateTime<Utc>,
}

/// Process-local cache. Entries are lost on restart.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn contains(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries.contains_key(key))
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Box<RawValue>>, CacheError> {
        Ok(self.entries.get(key).map(|entry| {
            tracing::debug!(
                %key,
                model = %entry.model,
                age_secs = (Utc::now() - entry.cached_at).num_seconds(),
                "memory cache entry read"
            );
            entry.response.clone()
        }))
    }

    async fn put(&self, key: &CacheKey, model: &str, response: &RawValue) -> Result<(), CacheError> {
        self.entries.insert(
            key.clone(),
            CacheEntry {
                response: response.to_owned(),
                model: model.to_string(),
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
