// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Caches for compiled expressions
//!
//! Artifacts are keyed by a content hash of the trimmed expression text, see
//! [`cache_key`]. Concurrent population is benign: two threads compiling the
//! same text store equivalent artifacts and the last writer wins.

use super::bytecode::CompiledExpression;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable cache key of an expression: `eel_` followed by the hex encoded
/// SHA-256 of the trimmed text
pub fn cache_key(expression: &str) -> String {
    let digest = Sha256::digest(expression.trim().as_bytes());
    format!("eel_{}", hex::encode(digest))
}

/// Storage for compiled expressions shared between evaluators
pub trait ExpressionCache: Send + Sync {
    /// Whether an artifact is stored under `key`
    fn has(&self, key: &str) -> bool;

    /// The artifact stored under `key`
    fn get(&self, key: &str) -> Option<Arc<CompiledExpression>>;

    /// Store an artifact, replacing any previous one
    fn set(&self, key: &str, compiled: Arc<CompiledExpression>);

    /// Hit/miss counters and current size
    fn stats(&self) -> CacheStats;

    /// Drop every stored artifact
    fn clear(&self);
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0, or 0.0 if no lookups happened
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record<T>(&self, found: Option<T>) -> Option<T> {
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn record_presence(&self, present: bool) -> bool {
        if !present {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        present
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Unbounded concurrent cache
#[derive(Debug, Default)]
pub struct MemoryExpressionCache {
    entries: DashMap<String, Arc<CompiledExpression>>,
    counters: Counters,
}

impl MemoryExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpressionCache for MemoryExpressionCache {
    fn has(&self, key: &str) -> bool {
        self.counters.record_presence(self.entries.contains_key(key))
    }

    fn get(&self, key: &str) -> Option<Arc<CompiledExpression>> {
        let found = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        self.counters.record(found)
    }

    fn set(&self, key: &str, compiled: Arc<CompiledExpression>) {
        self.entries.insert(key.to_string(), compiled);
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    fn clear(&self) {
        self.entries.clear();
        self.counters.reset();
    }
}

/// Bounded cache evicting the least recently used artifact
pub struct LruExpressionCache {
    entries: Mutex<LruCache<String, Arc<CompiledExpression>>>,
    counters: Counters,
}

impl LruExpressionCache {
    /// A cache holding at most `capacity` artifacts (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl ExpressionCache for LruExpressionCache {
    fn has(&self, key: &str) -> bool {
        let present = self.entries.lock().contains(key);
        self.counters.record_presence(present)
    }

    fn get(&self, key: &str) -> Option<Arc<CompiledExpression>> {
        let found = self.entries.lock().get(key).cloned();
        self.counters.record(found)
    }

    fn set(&self, key: &str, compiled: Arc<CompiledExpression>) {
        self.entries.lock().put(key.to_string(), compiled);
    }

    fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().len();
        self.counters.snapshot(entries)
    }

    fn clear(&self) {
        self.entries.lock().clear();
        self.counters.reset();
    }
}

impl std::fmt::Debug for LruExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruExpressionCache")
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Disabled cache: never stores, so every evaluation compiles
#[derive(Debug, Default)]
pub struct NullExpressionCache {
    counters: Counters,
}

impl NullExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpressionCache for NullExpressionCache {
    fn has(&self, _key: &str) -> bool {
        self.counters.record_presence(false)
    }

    fn get(&self, _key: &str) -> Option<Arc<CompiledExpression>> {
        self.counters.record(None)
    }

    fn set(&self, _key: &str, _compiled: Arc<CompiledExpression>) {}

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(0)
    }

    fn clear(&self) {
        self.counters.reset();
    }
}
