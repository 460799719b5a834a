//! Process-wide cache of active, valid tree records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::storage::TreeRecord;

struct Snapshot {
    loaded_at: Instant,
    records: Arc<Vec<TreeRecord>>,
}

/// Snapshot of every tree that is active and passes validation.
///
/// Entries expire after `ttl`; a zero `ttl` disables caching entirely.
/// Writers call [`ActiveTreeCache::invalidate`] after every successful
/// upload, activation toggle or delete.
///
/// Every invalidation bumps a generation counter. A refresh reads the
/// generation before loading from storage and only installs its records if no
/// invalidation happened in between.
pub struct ActiveTreeCache {
    ttl: Duration,
    generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ActiveTreeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// The cached records, unless missing or expired.
    pub async fn get(&self) -> Option<Arc<Vec<TreeRecord>>> {
        if !self.is_enabled() {
            return None;
        }
        let snapshot = self.snapshot.read().await;
        snapshot
            .as_ref()
            .filter(|s| s.loaded_at.elapsed() < self.ttl)
            .map(|s| Arc::clone(&s.records))
    }

    /// Current generation; read it before loading the records to store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replace the snapshot with records loaded at `generation`.
    ///
    /// Records loaded before the latest invalidation are returned to the
    /// caller but not cached.
    pub async fn store(&self, records: Vec<TreeRecord>, generation: u64) -> Arc<Vec<TreeRecord>> {
        let records = Arc::new(records);
        if !self.is_enabled() {
            return records;
        }

        let mut snapshot = self.snapshot.write().await;
        if self.generation() != generation {
            debug!(generation, "Discarding active tree refresh started before a write");
            return records;
        }
        *snapshot = Some(Snapshot {
            loaded_at: Instant::now(),
            records: Arc::clone(&records),
        });
        debug!(trees = records.len(), "Active tree cache refreshed");
        records
    }

    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.snapshot.write().await.take().is_some() {
            debug!("Active tree cache invalidated");
        }
    }
}
