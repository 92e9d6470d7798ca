//! Feed sources and the snapshot cache.
//!
//! A feed is a full-replace snapshot of catalog records. Where the records
//! come from (files, spreadsheets, marketplace APIs) is the implementer's
//! business; the engine only needs [`FeedSource::load_snapshot`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use vitrine_core::CatalogRecord;

use crate::error::FeedResult;

/// A source of full feed snapshots.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Load one consistent snapshot of every record in the feed.
    async fn load_snapshot(&self) -> FeedResult<Vec<CatalogRecord>>;

    /// Load a snapshot that bypasses any caching layer.
    ///
    /// Reconciliation reads the feed through this method.
    async fn load_fresh_snapshot(&self) -> FeedResult<Vec<CatalogRecord>> {
        self.load_snapshot().await
    }
}

/// Feed serving a fixed, replaceable set of records.
#[derive(Debug, Default)]
pub struct StaticFeed {
    records: RwLock<Vec<CatalogRecord>>,
    loads: AtomicUsize,
}

impl StaticFeed {
    #[must_use]
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            loads: AtomicUsize::new(0),
        }
    }

    /// Replace the records served by the next snapshot.
    pub async fn replace(&self, records: Vec<CatalogRecord>) {
        *self.records.write().await = records;
    }

    /// Number of snapshots loaded so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn name(&self) -> &str {
        "static"
    }

    async fn load_snapshot(&self) -> FeedResult<Vec<CatalogRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().await.clone())
    }
}

struct CachedSnapshot {
    records: Arc<Vec<CatalogRecord>>,
    loaded_at: Instant,
}

/// Time-bounded cache in front of a feed source.
///
/// Invalidation is explicit: [`FeedCache::clear`] drops the snapshot and
/// [`FeedCache::refresh`] reloads it unconditionally.
pub struct FeedCache {
    source: Arc<dyn FeedSource>,
    ttl: Duration,
    cached: RwLock<Option<CachedSnapshot>>,
}

impl FeedCache {
    pub fn new(source: Arc<dyn FeedSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Return the cached snapshot, loading it if absent or expired.
    pub async fn get(&self) -> FeedResult<Arc<Vec<CatalogRecord>>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.records));
            }
        }
        self.refresh().await
    }

    /// Reload the snapshot from the source.
    pub async fn refresh(&self) -> FeedResult<Arc<Vec<CatalogRecord>>> {
        let records = Arc::new(self.source.load_snapshot().await?);
        debug!(
            feed = %self.source.name(),
            records = records.len(),
            "Feed snapshot loaded"
        );
        *self.cached.write().await = Some(CachedSnapshot {
            records: Arc::clone(&records),
            loaded_at: Instant::now(),
        });
        Ok(records)
    }

    /// Drop the cached snapshot.
    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }

    /// Whether a fresh snapshot is cached.
    pub async fn is_cached(&self) -> bool {
        self.cached
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.loaded_at.elapsed() < self.ttl)
    }
}

#[async_trait]
impl FeedSource for FeedCache {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn load_snapshot(&self) -> FeedResult<Vec<CatalogRecord>> {
        Ok(self.get().await?.as_ref().clone())
    }

    async fn load_fresh_snapshot(&self) -> FeedResult<Vec<CatalogRecord>> {
        Ok(self.refresh().await?.as_ref().clone())
    }
}
