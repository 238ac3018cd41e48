//! In-process cache backend with real per-key TTL semantics.
//!
//! Used by tests and single-process deployments. Expiry is evaluated lazily
//! on every read: a key past its deadline is treated as absent, matching the
//! observable behavior of a shared cache's native TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::CacheBackend;
use crate::error::Result;

#[derive(Debug, Clone)]
struct ValueEntry {
    value: String,
    deadline: Instant,
}

#[derive(Debug, Clone, Default)]
struct IndexEntry {
    /// member -> score
    members: HashMap<String, f64>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct Tables {
    values: HashMap<String, ValueEntry>,
    indexes: HashMap<String, IndexEntry>,
}

/// In-memory [`CacheBackend`] implementation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    tables: Mutex<Tables>,
}

impl MemoryCache {
    /// Create a new empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of live value keys. Test/diagnostic helper.
    pub fn len(&self) -> usize {
        let tables = self.tables.lock();
        let now = Instant::now();
        tables.values.values().filter(|e| e.deadline > now).count()
    }

    /// Whether the cache holds no live value keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut tables = self.tables.lock();
        let now = Instant::now();
        match tables.values.get(key) {
            Some(entry) if entry.deadline > now => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        // Lapsed entry observed; drop it.
        tables.values.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.values.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                deadline: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut tables = self.tables.lock();
        let existed = match tables.values.remove(key) {
            Some(entry) => entry.deadline > Instant::now(),
            None => false,
        };
        Ok(existed)
    }

    async fn index_add(&self, key: &str, member: &str, score: f64, ttl: Duration) -> Result<()> {
        let mut tables = self.tables.lock();
        let now = Instant::now();
        let entry = tables.indexes.entry(key.to_string()).or_default();

        // An index past its own deadline starts over.
        if entry.deadline.is_some_and(|d| d <= now) {
            entry.members.clear();
            entry.deadline = None;
        }

        entry.members.insert(member.to_string(), score);

        // Raise the set TTL, never lower it.
        let candidate = now + ttl;
        entry.deadline = Some(match entry.deadline {
            Some(current) if current > candidate => current,
            _ => candidate,
        });
        Ok(())
    }

    async fn index_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut tables = self.tables.lock();
        let now = Instant::now();
        let lapsed = tables
            .indexes
            .get(key)
            .is_some_and(|entry| entry.deadline.is_some_and(|d| d <= now));
        if lapsed {
            tables.indexes.remove(key);
            return Ok(false);
        }
        match tables.indexes.get_mut(key) {
            Some(entry) => Ok(entry.members.remove(member).is_some()),
            None => Ok(false),
        }
    }

    async fn index_members(&self, key: &str) -> Result<Vec<String>> {
        let mut tables = self.tables.lock();
        let now = Instant::now();
        let lapsed = tables
            .indexes
            .get(key)
            .is_some_and(|entry| entry.deadline.is_some_and(|d| d <= now));
        if lapsed {
            tables.indexes.remove(key);
            return Ok(Vec::new());
        }
        let Some(entry) = tables.indexes.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, f64)> =
            entry.members.iter().map(|(m, s)| (m, *s)).collect();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut tables = self.tables.lock();
        let now = Instant::now();
        tables.values.retain(|_, entry| entry.deadline > now);
        Ok(tables
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
