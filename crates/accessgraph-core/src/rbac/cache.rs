// AccessGraph
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! TTL cache for role policies and per-user overrides
//!
//! Entries are checked for expiry on read; there is no background refresh.
//! The map lock is never held while a value is being computed, so two
//! concurrent misses on the same key may both compute. An invalidation that
//! lands while a computation is in flight discards that computation's result
//! instead of caching it.

use super::overrides::OverrideSet;
use crate::model::UserId;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Key of a cached value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Permission codes granted to a role
    Role(String),
    /// Override rows of a user
    UserOverrides(UserId),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Role(role) => write!(f, "role:{}", role),
            CacheKey::UserOverrides(user_id) => write!(f, "user:{}:overrides", user_id),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    computed_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.computed_at.elapsed() > ttl
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they outlived the TTL
    pub evictions: u64,
    /// Explicit point or global invalidations
    pub invalidations: u64,
    pub current_size: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 { 0.0 } else { self.hits as f64 / (self.hits + self.misses) as f64 }
    }
}

enum Lookup<V> {
    Fresh(V),
    Stale,
    Missing,
}

/// Keyed cache with TTL-on-read semantics
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    /// Bumped by every invalidation
    generation: AtomicU64,
    stats: RwLock<CacheStats>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    /// A failing `compute` propagates its error and stores nothing.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let lookup = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(ttl) => Lookup::Fresh(entry.value.clone()),
            Some(_) => Lookup::Stale,
            None => Lookup::Missing,
        };

        match lookup {
            Lookup::Fresh(value) => {
                self.stats.write().hits += 1;
                counter!("accessgraph_cache_hits", 1);
                debug!(key = ?key, "Permission cache hit");
                return Ok(value);
            }
            Lookup::Stale => {
                if self.entries.remove_if(key, |_, entry| entry.is_expired(ttl)).is_some() {
                    self.stats.write().evictions += 1;
                }
            }
            Lookup::Missing => {}
        }

        self.stats.write().misses += 1;
        counter!("accessgraph_cache_misses", 1);
        debug!(key = ?key, "Permission cache miss");

        let generation = self.generation.load(Ordering::SeqCst);
        let value = compute().await?;

        // The shard lock taken by `entry` orders this check against a
        // concurrent invalidation's removal.
        let entry = self.entries.entry(key.clone());
        if self.generation.load(Ordering::SeqCst) == generation {
            entry.insert(CacheEntry {
                value: value.clone(),
                computed_at: Instant::now(),
            });
        } else {
            debug!(key = ?key, "Discarding value computed across an invalidation");
        }

        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(key);
        self.stats.write().invalidations += 1;
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
        self.stats.write().invalidations += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.current_size = self.entries.len();
        stats
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cache of role policies and user override sets
#[derive(Debug)]
pub struct PermissionCache {
    ttl: Duration,
    roles: TtlCache<String, HashSet<String>>,
    overrides: TtlCache<UserId, OverrideSet>,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            roles: TtlCache::new(),
            overrides: TtlCache::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached codes of `role`, computed on a miss
    pub async fn role_codes<F, Fut, E>(&self, role: &str, compute: F) -> Result<HashSet<String>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashSet<String>, E>>,
    {
        self.roles.get_or_compute(&role.to_string(), self.ttl, compute).await
    }

    /// Cached override set of `user_id`, computed on a miss
    pub async fn user_overrides<F, Fut, E>(&self, user_id: UserId, compute: F) -> Result<OverrideSet, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<OverrideSet, E>>,
    {
        self.overrides.get_or_compute(&user_id, self.ttl, compute).await
    }

    pub fn invalidate(&self, key: &CacheKey) {
        match key {
            CacheKey::Role(role) => self.roles.invalidate(role),
            CacheKey::UserOverrides(user_id) => self.overrides.invalidate(user_id),
        }
        debug!(key = %key, "Invalidated cache entry");
    }

    pub fn invalidate_all(&self) {
        self.roles.invalidate_all();
        self.overrides.invalidate_all();
        debug!("Cleared all cache entries");
    }

    /// Combined statistics of both maps
    pub fn stats(&self) -> CacheStats {
        let roles = self.roles.stats();
        let overrides = self.overrides.stats();

        CacheStats {
            hits: roles.hits + overrides.hits,
            misses: roles.misses + overrides.misses,
            evictions: roles.evictions + overrides.evictions,
            invalidations: roles.invalidations + overrides.invalidations,
            current_size: roles.current_size + overrides.current_size,
        }
    }
}
