// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed async locks for per-entity serialization.
//!
//! Session lifecycle operations serialize per session id; balance mutations
//! serialize per account id. [`LockMap`] hands out one `Mutex` per key so
//! different keys never contend with each other.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// A map of independent async locks, one per key.
///
/// Holders keep the `Arc` alive for as long as they need the guard, so
/// [`LockMap::discard`] is safe while a guard is held: the holder's mutex
/// stays valid, only the map entry is dropped.
pub struct LockMap<K> {
    inner: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockMap<K> {
    pub fn new() -> Self {
        LockMap {
            inner: DashMap::new(),
        }
    }

    /// The lock for `key`, created on first use.
    pub fn lock_handle(&self, key: &K) -> Arc<Mutex<()>> {
        self.inner
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry for `key`.
    ///
    /// Callers must only discard keys whose guarded state can no longer be
    /// mutated (e.g. a session in a terminal state).
    pub fn discard(&self, key: &K) {
        self.inner.remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for LockMap<K> {
    fn default() -> Self {
        Self::new()
    }
}
