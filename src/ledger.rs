//! Durable per-entity quota accounting.
//!
//! The whole ledger is persisted as one snapshot under a single key of the
//! backing [`KvStore`]. Counter updates take only the entity's map shard lock,
//! so reservations for unrelated entities never wait on each other or on I/O.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{EntityProgress, PageCursor, Quota};
use crate::state::{KvStore, StateError};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerSnapshot {
    version: u32,
    entities: BTreeMap<String, EntityProgress>,
}

pub struct QuotaLedger {
    store: Arc<dyn KvStore>,
    key: String,
    entries: DashMap<String, EntityProgress>,
    // Serializes snapshot+put so an older snapshot never overwrites a newer one.
    flush_lock: Mutex<()>,
}

impl QuotaLedger {
    /// Create an empty ledger bound to `store` without reading it.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_key(store, Config::LEDGER_KEY)
    }

    pub fn with_key(store: Arc<dyn KvStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
            entries: DashMap::new(),
            flush_lock: Mutex::new(()),
        }
    }

    /// Create a ledger and restore the persisted snapshot, if any.
    pub fn open(store: Arc<dyn KvStore>) -> Self {
        let ledger = Self::new(store);
        ledger.load();
        ledger
    }

    /// Replace in-memory state with the persisted snapshot.
    ///
    /// A missing, unreadable or corrupt snapshot yields an empty ledger and a
    /// warning; it is never fatal. Returns the number of entities restored.
    pub fn load(&self) -> usize {
        let _guard = self.flush_lock.lock();
        self.entries.clear();

        let bytes = match self.store.get(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %self.key, "No ledger snapshot found, starting empty");
                return 0;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ledger snapshot unreadable, starting empty");
                return 0;
            }
        };

        let snapshot: LedgerSnapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ledger snapshot corrupt, starting empty");
                return 0;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Unknown ledger snapshot version, starting empty"
            );
            return 0;
        }

        let restored = snapshot.entities.len();
        for (entity, progress) in snapshot.entities {
            self.entries.insert(entity, progress);
        }
        info!(entities = restored, "Restored quota ledger");
        restored
    }

    /// Persist the full ledger as one atomic snapshot.
    pub fn flush(&self) -> Result<(), StateError> {
        let _guard = self.flush_lock.lock();
        let snapshot = LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            entities: self.snapshot(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| StateError::Serialization(format!("Serialize failed: {}", e)))?;
        self.store.put(&self.key, &bytes)?;
        debug!(entities = snapshot.entities.len(), "Flushed quota ledger");
        Ok(())
    }

    /// Grant up to `requested` more records for `entity` and record the grant.
    ///
    /// `granted = max(0, min(requested, quota - accepted))`; always `requested`
    /// for an unbounded quota. The entity entry is created lazily and remembers
    /// the quota it was last accounted under.
    pub fn reserve(&self, entity: &str, requested: u64, quota: Quota) -> u64 {
        let mut entry = self.entries.entry(entity.to_string()).or_default();
        let granted = match quota {
            Quota::Unbounded => requested,
            Quota::Limited(limit) => requested.min(limit.saturating_sub(entry.accepted)),
        };
        entry.accepted = entry.accepted.saturating_add(granted);
        entry.quota = Some(quota);
        granted
    }

    /// Records still grantable for `entity`. `u64::MAX` when unbounded.
    pub fn remaining(&self, entity: &str, quota: Quota) -> u64 {
        match quota {
            Quota::Unbounded => u64::MAX,
            Quota::Limited(limit) => {
                let accepted = self.entries.get(entity).map(|e| e.accepted).unwrap_or(0);
                limit.saturating_sub(accepted)
            }
        }
    }

    pub fn accepted(&self, entity: &str) -> u64 {
        self.entries.get(entity).map(|e| e.accepted).unwrap_or(0)
    }

    /// Record where pagination continues for `entity`. `None` marks the entity finished.
    pub fn set_cursor(&self, entity: &str, cursor: Option<PageCursor>) {
        let mut entry = self.entries.entry(entity.to_string()).or_default();
        entry.finished = cursor.is_none();
        entry.cursor = cursor;
    }

    /// Put back a cursor captured before a commit that did not complete.
    pub fn restore_cursor(&self, entity: &str, cursor: Option<PageCursor>) {
        if let Some(mut entry) = self.entries.get_mut(entity) {
            entry.cursor = cursor;
            entry.finished = false;
        }
    }

    pub fn progress(&self, entity: &str) -> Option<EntityProgress> {
        self.entries.get(entity).map(|e| e.value().clone())
    }

    /// Copy of every entity's progress, ordered by entity key.
    pub fn snapshot(&self) -> BTreeMap<String, EntityProgress> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Forget one entity. Takes effect durably on the next flush.
    pub fn remove(&self, entity: &str) -> bool {
        self.entries.remove(entity).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
