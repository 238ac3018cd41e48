//! Cache backend trait for pluggable shared-cache implementations.
//!
//! This module defines the `CacheBackend` trait that allows different cache
//! technologies (Redis, in-memory, mock) to be used interchangeably by the
//! session manager. The trait deliberately mirrors the small set of atomic
//! primitives a shared cache exposes: single-key get/put-with-TTL/delete,
//! atomic membership operations on an ordered set, and prefix scans.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for shared cache backends.
///
/// All operations are bounded-latency network (or in-process) calls. Callers
/// that sit on a request hot path are expected to wrap these in their own
/// deadline; implementations must never block indefinitely on their own.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow sharing across
/// request-handling tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the value stored at `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or its TTL has lapsed.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` at `key` with a per-key TTL.
    ///
    /// Overwrites any existing value and replaces its TTL.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete the value at `key`.
    ///
    /// Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically add `member` with `score` to the ordered set at `key`.
    ///
    /// If the member already exists its score is updated. The set key's own
    /// TTL is raised to at least `ttl`, never lowered, so the index outlives
    /// its longest-lived member.
    async fn index_add(&self, key: &str, member: &str, score: f64, ttl: Duration) -> Result<()>;

    /// Atomically remove `member` from the ordered set at `key`.
    ///
    /// Returns `true` if the member was present.
    async fn index_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// List the members of the ordered set at `key`, ascending by score.
    ///
    /// Returns an empty list for an absent or expired set.
    async fn index_members(&self, key: &str) -> Result<Vec<String>>;

    /// List all live keys starting with `prefix`.
    ///
    /// O(n) over the keyspace; intended for maintenance and observability
    /// passes, not the request hot path.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;
}
