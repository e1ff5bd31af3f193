//! Key vault
//!
//! Server-side registry of issued token keys and the value each must carry.
//! Shared by every request in the process; backed by `DashMap` so inserts
//! and lookups on the same key are linearizable.
//!
//! Expired entries are evicted lazily when looked up. `purge_expired` and
//! `spawn_compaction_task` exist for deployments that want to bound growth.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct VaultEntry {
    value: String,
    expire: i64,
}

impl VaultEntry {
    fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expire
    }
}

/// Result of checking a key/value pair against the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultCheck {
    Valid,
    Missing,
    Mismatch,
    Expired,
}

/// In-memory key vault
#[derive(Debug, Default)]
pub struct KeyVault {
    entries: DashMap<String, VaultEntry>,
}

impl KeyVault {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert a new key, refusing to overwrite an existing one
    ///
    /// Returns false on a key collision.
    pub fn try_insert(&self, key: &str, value: &str, expire: i64) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(VaultEntry {
                    value: value.to_string(),
                    expire,
                });
                true
            }
        }
    }

    /// Check a key/value pair at time `now`, evicting the entry if expired
    pub fn check(&self, key: &str, value: &str, now: i64) -> VaultCheck {
        // The read guard must be released before removing
        let outcome = match self.entries.get(key) {
            None => VaultCheck::Missing,
            Some(entry) if entry.is_expired_at(now) => VaultCheck::Expired,
            Some(entry) if constant_time_compare(&entry.value, value) => VaultCheck::Valid,
            Some(_) => VaultCheck::Mismatch,
        };

        if outcome == VaultCheck::Expired
            && self
                .entries
                .remove_if(key, |_, entry| entry.is_expired_at(now))
                .is_some()
        {
            debug!("Evicted expired vault entry on lookup");
        }

        outcome
    }

    /// Value stored for a key, expired or not
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry expired at `now`; returns how many were removed
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Vault statistics at `now`
    pub fn stats(&self, now: i64) -> VaultStats {
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .count();

        VaultStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total.saturating_sub(expired),
        }
    }
}

/// Vault statistics
#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

/// Periodically purge expired entries
pub fn spawn_compaction_task(vault: Arc<KeyVault>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = vault.purge_expired(Utc::now().timestamp());
            if removed > 0 {
                info!("Compacted {} expired vault entries", removed);
            }
        }
    })
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
