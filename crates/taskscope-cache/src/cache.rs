//! Cache trait and shared operations

use async_trait::async_trait;
use serde::Serialize;
use taskscope_core::{CacheEntry, ClassificationResult, Result};
use tracing::{debug, info};

/// Keys fetched per purge page
pub const DEFAULT_PURGE_PAGE_SIZE: usize = 100;

/// Trait for classification stores
#[async_trait]
pub trait ClassificationCache: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Look up the entry for `key`
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Create the entry for `key`
    ///
    /// Fails with [`taskscope_core::Error::AlreadyExists`] when an entry is
    /// already stored; existing entries are never overwritten.
    async fn put(&self, key: &str, classification: &ClassificationResult) -> Result<CacheEntry>;

    /// Every stored entry, oldest first
    async fn list_all(&self) -> Result<Vec<CacheEntry>>;

    /// Up to `limit` keys in ascending order, strictly after `after`
    async fn list_keys(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>>;

    /// Remove a single key; only used by [`ClassificationCache::purge_all`]
    async fn evict(&self, key: &str) -> Result<bool>;

    /// Remove every entry and return how many were removed
    ///
    /// Keys are enumerated one page at a time and each page is deleted
    /// concurrently before the next page is fetched. Not atomic: entries
    /// written while a purge runs may survive it.
    async fn purge_all(&self, page_size: usize) -> Result<usize> {
        let page_size = page_size.max(1);
        let mut removed = 0;
        let mut cursor: Option<String> = None;

        loop {
            let keys = self.list_keys(cursor.as_deref(), page_size).await?;
            if keys.is_empty() {
                break;
            }

            let results = futures::future::join_all(keys.iter().map(|key| self.evict(key))).await;
            for result in results {
                if result? {
                    removed += 1;
                }
            }
            debug!("Purged page of {} keys from {} cache", keys.len(), self.name());

            if keys.len() < page_size {
                break;
            }
            cursor = keys.last().cloned();
        }

        info!("Purged {} entries from {} cache", removed, self.name());
        Ok(removed)
    }

    /// Entry count plus the oldest and newest entries
    async fn stats(&self) -> Result<CacheStats> {
        let entries = self.list_all().await?;
        Ok(CacheStats::from_entries(entries))
    }
}

/// Summary of cache contents
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of entries
    pub count: usize,

    /// Earliest-created entry
    pub oldest: Option<CacheEntry>,

    /// Latest-created entry
    pub newest: Option<CacheEntry>,
}

impl CacheStats {
    /// Compute stats from a set of entries
    pub fn from_entries(entries: Vec<CacheEntry>) -> Self {
        let count = entries.len();
        let oldest = entries.iter().min_by_key(|e| e.created_at).cloned();
        let newest = entries.into_iter().max_by_key(|e| e.created_at);
        Self {
            count,
            oldest,
            newest,
        }
    }
}
