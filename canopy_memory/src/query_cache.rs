// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A shared, bounded cache of query results.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

/// One cached result and when it was stored.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Caller time of insertion, in milliseconds.
    pub inserted_at: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
    capacity: usize,
    ttl_ms: Option<u64>,
}

/// Cross-instance cache of search results, keyed by query string.
///
/// Cloning yields another handle to the same cache. Writers replace whole entries and
/// never mutate one in place, so a reader holding an `Arc<CacheEntry<V>>` always sees a
/// complete value. When full, inserting evicts the oldest entry.
#[derive(Debug)]
pub struct QueryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> QueryCache<V> {
    /// A cache holding at most `capacity` entries, each valid for `ttl_ms` (forever when
    /// `None`).
    pub fn new(capacity: usize, ttl_ms: Option<u64>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                capacity,
                ttl_ms,
            }),
        }
    }

    /// The live entry for `query`, if any.
    pub fn get(&self, query: &str, now: u64) -> Option<Arc<CacheEntry<V>>> {
        let entries = self.inner.entries.read();
        let entry = entries.get(query)?;
        if self.is_expired(entry, now) {
            return None;
        }
        Some(Arc::clone(entry))
    }

    /// Store `value` for `query`, replacing any previous entry.
    pub fn insert(&self, query: impl Into<String>, value: V, now: u64) -> Arc<CacheEntry<V>> {
        let query = query.into();
        let entry = Arc::new(CacheEntry {
            value,
            inserted_at: now,
        });
        if self.inner.capacity == 0 {
            return entry;
        }
        let mut entries = self.inner.entries.write();
        if !entries.contains_key(&query) && entries.len() >= self.inner.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(q, _)| q.clone());
            if let Some(oldest) = oldest {
                trace!(query = %oldest, "query cache full, dropping oldest entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(query, Arc::clone(&entry));
        entry
    }

    /// Drop the entry for `query`. Returns `true` if there was one.
    pub fn invalidate(&self, query: &str) -> bool {
        self.inner.entries.write().remove(query).is_some()
    }

    /// Drop every expired entry and return how many were dropped.
    pub fn purge_expired(&self, now: u64) -> usize {
        if self.inner.ttl_ms.is_none() {
            return 0;
        }
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        self.inner
            .ttl_ms
            .is_some_and(|ttl| now.saturating_sub(entry.inserted_at) >= ttl)
    }
}
