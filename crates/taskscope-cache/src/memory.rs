//! In-memory cache backend

use crate::ClassificationCache;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use taskscope_core::{CacheEntry, ClassificationResult, Error, Result};

/// Process-local classification cache
///
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ClassificationCache for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, classification: &ClassificationResult) -> Result<CacheEntry> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        let entry = CacheEntry::new(key, classification.clone());
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn list_all(&self) -> Result<Vec<CacheEntry>> {
        let mut all: Vec<CacheEntry> = self.entries.read().values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.model_key.cmp(&b.model_key))
        });
        Ok(all)
    }

    async fn list_keys(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>> {
        let entries = self.entries.read();
        let lower = match after {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        Ok(entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn evict(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}
