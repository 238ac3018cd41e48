//! Session manager: lifecycle, validation and maintenance operations.
//!
//! The manager owns no state of its own; every operation round-trips the
//! shared cache, so any number of service instances can run the same code
//! against the same keyspace. Cross-instance coordination is deliberately
//! lock-free: per-session writes are last-write-wins on a single key,
//! per-principal index mutations go through the backend's atomic set
//! primitives, and the per-principal session bound is enforced best-effort
//! at creation time (a later create or sweep restores it after transient
//! overshoot).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};
use uuid::Uuid;
use vantage_cache::{CacheBackend, CacheError};

use crate::config::{CreateOptions, SessionConfig};
use crate::error::{Error, Result};
use crate::record::{SessionFields, SessionRecord, SessionStats, SessionUpdate};

/// Outcome of [`SessionManager::validate_session`].
///
/// Validation is infallible by contract: every failure mode collapses into
/// a denial so access-control call sites need exactly one branch.
#[derive(Debug)]
pub enum Access {
    /// Session is live and holds every required permission.
    Granted(SessionRecord),

    /// Request must be refused.
    Denied(DenyReason),
}

impl Access {
    /// Whether access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Why a validation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No live session with that id.
    NotFound,

    /// The record was still present but past its logical expiry.
    Expired,

    /// Session is live but lacks the named permission.
    MissingPermission(String),

    /// The cache could not be consulted; access fails closed.
    StoreUnavailable,
}

/// What a primary-key read found.
enum Fetched {
    Missing,
    Expired(SessionRecord),
    Live(SessionRecord),
}

/// TTL-bound, sliding-capable session store over a shared cache.
///
/// Construct one per process and inject it wherever sessions are needed;
/// cloning is cheap and clones share the cache handle.
pub struct SessionManager<C: CacheBackend> {
    cache: Arc<C>,
    config: SessionConfig,
}

impl<C: CacheBackend> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<C: CacheBackend + 'static> SessionManager<C> {
    /// Create a manager owning its cache backend.
    pub fn new(cache: C, config: SessionConfig) -> Self {
        Self::with_shared(Arc::new(cache), config)
    }

    /// Create a manager over a shared cache handle.
    pub fn with_shared(cache: Arc<C>, config: SessionConfig) -> Self {
        Self { cache, config }
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}:{}", self.config.key_prefix, id)
    }

    fn index_key(&self, principal_id: &str) -> String {
        format!("{}:{}", self.config.index_prefix, principal_id)
    }

    /// Run a cache call under the configured deadline.
    async fn cache_call<T>(
        &self,
        fut: impl Future<Output = vantage_cache::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.op_timeout, fut).await {
            Ok(result) => result.map_err(Error::Store),
            Err(_) => Err(Error::Store(CacheError::Timeout)),
        }
    }

    fn ttl_delta(ttl: Duration) -> Result<chrono::Duration> {
        chrono::Duration::from_std(ttl)
            .map_err(|_| Error::InvalidArgument("session TTL out of range".to_string()))
    }

    /// Lifetime a sliding renewal re-grants: the session's own recorded TTL,
    /// falling back to the configured default for records that predate the
    /// `ttlSeconds` field.
    fn session_ttl(&self, record: &SessionRecord) -> Duration {
        if record.ttl_seconds > 0.0 && record.ttl_seconds.is_finite() {
            Duration::from_secs_f64(record.ttl_seconds)
        } else {
            self.config.ttl
        }
    }

    /// Create a session for `principal_id` and return its id.
    ///
    /// Enforces the per-principal bound first (evicting oldest-activity
    /// sessions), then writes the primary record and its index entry. A
    /// failed index write is logged and tolerated: the session stays fully
    /// valid, and listing heals the gap lazily.
    pub async fn create_session(
        &self,
        principal_id: &str,
        fields: SessionFields,
        opts: CreateOptions,
    ) -> Result<String> {
        if principal_id.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "principal id must not be empty".to_string(),
            ));
        }
        let ttl = opts.ttl.unwrap_or(self.config.ttl);
        if ttl.is_zero() {
            return Err(Error::InvalidArgument(
                "session TTL must be positive".to_string(),
            ));
        }

        if let Some(max) = opts.max_sessions.or(self.config.max_sessions) {
            if max == 0 {
                return Err(Error::InvalidArgument(
                    "max sessions must be positive".to_string(),
                ));
            }
            self.enforce_session_bound(principal_id, max).await?;
        }

        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            principal_id: principal_id.to_string(),
            principal_email: fields.principal_email,
            role: fields.role,
            organization_id: fields.organization_id,
            permissions: fields.permissions,
            metadata: fields.metadata,
            ttl_seconds: ttl.as_secs_f64(),
            created_at: now,
            last_activity: now,
            expires_at: now + Self::ttl_delta(ttl)?,
        };

        self.write_record(&record, ttl).await?;

        debug!(
            session_id = %record.id,
            principal_id = %principal_id,
            ttl_secs = ttl.as_secs(),
            "Session created"
        );
        Ok(record.id)
    }

    /// Evict oldest-activity sessions until the principal is strictly under
    /// `max` with room for one incoming session.
    ///
    /// Victims are identified by the session id stored in the index entry.
    /// Stale entries (no primary record behind them) are dropped rather than
    /// counted, so a drifted index cannot evict live sessions spuriously.
    async fn enforce_session_bound(&self, principal_id: &str, max: usize) -> Result<()> {
        let index_key = self.index_key(principal_id);
        let members = self.cache_call(self.cache.index_members(&index_key)).await?;

        // Oldest lastActivity first, per index score order.
        let mut live = Vec::new();
        for member in members {
            let present = self
                .cache_call(self.cache.get(&self.session_key(&member)))
                .await?
                .is_some();
            if present {
                live.push(member);
            } else {
                let _ = self
                    .cache_call(self.cache.index_remove(&index_key, &member))
                    .await;
            }
        }

        if live.len() < max {
            return Ok(());
        }

        let evict = live.len() + 1 - max;
        for victim in live.iter().take(evict) {
            debug!(
                session_id = %victim,
                principal_id = %principal_id,
                "Evicting oldest session to enforce per-principal bound"
            );
            self.cache_call(self.cache.delete(&self.session_key(victim)))
                .await?;
            let _ = self
                .cache_call(self.cache.index_remove(&index_key, victim))
                .await;
        }
        Ok(())
    }

    /// Serialize and write a record with `ttl`, then refresh its index entry.
    async fn write_record(&self, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.cache_call(self.cache.put(&self.session_key(&record.id), &raw, ttl))
            .await?;

        let score = record.last_activity.timestamp_millis() as f64;
        let index_key = self.index_key(&record.principal_id);
        if let Err(err) = self
            .cache_call(self.cache.index_add(&index_key, &record.id, score, ttl))
            .await
        {
            // Session stays valid; listing filters the gap until the next
            // successful write or sweep.
            warn!(
                session_id = %record.id,
                principal_id = %record.principal_id,
                error = %err,
                "Session index write failed"
            );
        }
        Ok(())
    }

    /// Read and decode the primary record, classifying the result.
    ///
    /// A payload that no longer decodes is deleted on sight; callers see it
    /// as missing.
    async fn fetch(&self, id: &str) -> Result<Fetched> {
        let key = self.session_key(id);
        let Some(raw) = self.cache_call(self.cache.get(&key)).await? else {
            return Ok(Fetched::Missing);
        };
        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(session_id = %id, error = %err, "Dropping malformed session record");
                let _ = self.cache_call(self.cache.delete(&key)).await;
                return Ok(Fetched::Missing);
            }
        };
        if record.is_expired(Utc::now()) {
            Ok(Fetched::Expired(record))
        } else {
            Ok(Fetched::Live(record))
        }
    }

    /// Delete a record and its index entry, ignoring individual failures.
    async fn reap(&self, record: &SessionRecord) {
        let _ = self
            .cache_call(self.cache.delete(&self.session_key(&record.id)))
            .await;
        let _ = self
            .cache_call(
                self.cache
                    .index_remove(&self.index_key(&record.principal_id), &record.id),
            )
            .await;
    }

    /// Fetch a live session. `Ok(None)` covers both "never existed" and
    /// "expired"; a record outliving its cache TTL through clock skew is
    /// deleted here rather than returned stale.
    pub async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        match self.fetch(id).await? {
            Fetched::Live(record) => Ok(Some(record)),
            Fetched::Expired(record) => {
                debug!(session_id = %id, "Session outlived cache TTL; reaping");
                self.reap(&record).await;
                Ok(None)
            }
            Fetched::Missing => Ok(None),
        }
    }

    /// Record activity on a session. Returns `false` when it is absent or
    /// expired.
    ///
    /// With `sliding`, the expiry is recomputed as `now` plus the session's
    /// own lifetime and the cache TTL rewritten; otherwise the remaining
    /// lifetime is preserved.
    pub async fn touch_session(&self, id: &str, sliding: bool) -> Result<bool> {
        let Some(mut record) = self.get_session(id).await? else {
            return Ok(false);
        };
        let now = Utc::now();
        record.last_activity = now;

        let ttl = if sliding {
            let ttl = self.session_ttl(&record);
            record.expires_at = now + Self::ttl_delta(ttl)?;
            ttl
        } else {
            record.remaining_ttl(now)
        };

        self.write_record(&record, ttl).await?;
        trace!(session_id = %id, sliding, "Session touched");
        Ok(true)
    }

    /// Merge a partial update into a session. Returns `false` when it is
    /// absent or expired.
    ///
    /// Bumps `last_activity` but leaves the expiry untouched unless the
    /// caller also asks for sliding renewal.
    pub async fn update_session(
        &self,
        id: &str,
        update: SessionUpdate,
        sliding: bool,
    ) -> Result<bool> {
        let Some(mut record) = self.get_session(id).await? else {
            return Ok(false);
        };
        let now = Utc::now();
        record.apply(update);
        record.last_activity = now;

        let ttl = if sliding {
            let ttl = self.session_ttl(&record);
            record.expires_at = now + Self::ttl_delta(ttl)?;
            ttl
        } else {
            record.remaining_ttl(now)
        };

        self.write_record(&record, ttl).await?;
        debug!(session_id = %id, "Session updated");
        Ok(true)
    }

    /// Delete a session. Returns `true` if a primary record was removed.
    ///
    /// Index removal is best-effort: a failure leaves a stale entry that
    /// listing and sweeping heal later.
    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        let key = self.session_key(id);
        let raw = self.cache_call(self.cache.get(&key)).await?;
        let removed = self.cache_call(self.cache.delete(&key)).await?;

        if let Some(raw) = raw
            && let Ok(record) = serde_json::from_str::<SessionRecord>(&raw)
            && let Err(err) = self
                .cache_call(
                    self.cache
                        .index_remove(&self.index_key(&record.principal_id), id),
                )
                .await
        {
            debug!(session_id = %id, error = %err, "Index removal failed; entry heals lazily");
        }

        if removed {
            debug!(session_id = %id, "Session deleted");
        }
        Ok(removed)
    }

    /// Delete every session of a principal. Returns the number of primary
    /// records actually removed; stale index entries are no-ops, and a
    /// repeat call returns 0.
    pub async fn delete_principal_sessions(&self, principal_id: &str) -> Result<usize> {
        let index_key = self.index_key(principal_id);
        let members = self.cache_call(self.cache.index_members(&index_key)).await?;

        let mut removed = 0;
        for member in &members {
            if self
                .cache_call(self.cache.delete(&self.session_key(member)))
                .await?
            {
                removed += 1;
            }
        }
        let _ = self.cache_call(self.cache.delete(&index_key)).await;

        if removed > 0 {
            debug!(principal_id = %principal_id, count = removed, "Principal sessions revoked");
        }
        Ok(removed)
    }

    /// List a principal's live sessions, oldest activity first.
    ///
    /// Index entries without a live record behind them are dropped from the
    /// result and removed from the index.
    pub async fn list_principal_sessions(
        &self,
        principal_id: &str,
    ) -> Result<Vec<SessionRecord>> {
        let index_key = self.index_key(principal_id);
        let members = self.cache_call(self.cache.index_members(&index_key)).await?;

        let mut records = Vec::with_capacity(members.len());
        for member in members {
            match self.get_session(&member).await? {
                Some(record) => records.push(record),
                None => {
                    trace!(session_id = %member, "Healing stale index entry");
                    let _ = self
                        .cache_call(self.cache.index_remove(&index_key, &member))
                        .await;
                }
            }
        }
        Ok(records)
    }

    /// Gate a request on a session id and a set of required permissions.
    ///
    /// Never fails: cache errors, absence, expiry and missing permissions
    /// all collapse into [`Access::Denied`]. Missing permissions are logged
    /// as security events, distinguishable from plain absence. When the
    /// manager is configured for sliding expiration, a granted validation
    /// renews the session.
    pub async fn validate_session(&self, id: &str, required_permissions: &[&str]) -> Access {
        let record = match self.fetch(id).await {
            Ok(Fetched::Live(record)) => record,
            Ok(Fetched::Expired(record)) => {
                self.reap(&record).await;
                return Access::Denied(DenyReason::Expired);
            }
            Ok(Fetched::Missing) => return Access::Denied(DenyReason::NotFound),
            Err(err) => {
                warn!(session_id = %id, error = %err, "Session store unreachable; failing closed");
                return Access::Denied(DenyReason::StoreUnavailable);
            }
        };

        if let Some(missing) = record.missing_permission(required_permissions) {
            warn!(
                session_id = %id,
                principal_id = %record.principal_id,
                permission = %missing,
                "Session denied a required permission"
            );
            return Access::Denied(DenyReason::MissingPermission(missing.to_string()));
        }

        if self.config.sliding
            && let Err(err) = self.touch_session(id, true).await
        {
            debug!(session_id = %id, error = %err, "Sliding renewal failed; session remains valid");
        }

        Access::Granted(record)
    }

    /// Like [`validate_session`](Self::validate_session) but surfacing the
    /// failure as an error, for administrative call sites that log and
    /// propagate rather than branch on a denial.
    pub async fn require_session(
        &self,
        id: &str,
        required_permissions: &[&str],
    ) -> Result<SessionRecord> {
        match self.fetch(id).await? {
            Fetched::Live(record) => match record.missing_permission(required_permissions) {
                Some(missing) => Err(Error::PermissionDenied(missing.to_string())),
                None => Ok(record),
            },
            Fetched::Expired(record) => {
                self.reap(&record).await;
                Err(Error::NotFound(id.to_string()))
            }
            Fetched::Missing => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Remove every record whose logical expiry has passed. Returns the
    /// count reaped.
    ///
    /// Compensates for drift between the cache's native TTL and the stored
    /// timestamp, and for backends without per-key expiry. Idempotent and
    /// safe to run concurrently with foreground traffic; `get_session` never
    /// depends on it.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let prefix = format!("{}:", self.config.key_prefix);
        let keys = self.cache_call(self.cache.scan(&prefix)).await?;
        let now = Utc::now();

        let mut reaped = 0;
        for key in keys {
            let Some(raw) = self.cache_call(self.cache.get(&key)).await? else {
                continue;
            };
            match serde_json::from_str::<SessionRecord>(&raw) {
                Ok(record) if record.is_expired(now) => {
                    self.reap(&record).await;
                    reaped += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "Sweeping malformed session record");
                    let _ = self.cache_call(self.cache.delete(&key)).await;
                    reaped += 1;
                }
            }
        }

        if reaped > 0 {
            debug!(count = reaped, "Swept expired sessions");
        }
        Ok(reaped)
    }

    /// Number of primary records currently in the keyspace. O(n) scan;
    /// observability only.
    pub async fn count_active(&self) -> Result<usize> {
        let prefix = format!("{}:", self.config.key_prefix);
        let keys = self.cache_call(self.cache.scan(&prefix)).await?;
        Ok(keys.len())
    }

    /// Aggregate statistics over live sessions. O(n) scan; observability
    /// only.
    pub async fn compute_stats(&self) -> Result<SessionStats> {
        let prefix = format!("{}:", self.config.key_prefix);
        let keys = self.cache_call(self.cache.scan(&prefix)).await?;
        let now = Utc::now();

        let mut active = 0usize;
        let mut by_role: HashMap<String, usize> = HashMap::new();
        let mut total_duration = Duration::ZERO;

        for key in keys {
            let Some(raw) = self.cache_call(self.cache.get(&key)).await? else {
                continue;
            };
            let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) else {
                continue;
            };
            if record.is_expired(now) {
                continue;
            }
            active += 1;
            *by_role.entry(record.role.clone()).or_default() += 1;
            total_duration += session_duration(&record);
        }

        let avg_duration = if active > 0 {
            total_duration / active as u32
        } else {
            Duration::ZERO
        };

        Ok(SessionStats {
            active,
            by_role,
            avg_duration,
        })
    }

    /// Spawn the background sweep loop.
    ///
    /// Independently schedulable; foreground correctness never waits on it.
    /// Abort the returned handle to stop sweeping.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = manager.sweep_expired().await {
                    warn!(error = %err, "Background session sweep failed");
                }
            }
        })
    }
}

fn session_duration(record: &SessionRecord) -> Duration {
    (record.last_activity - record.created_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_cache::MemoryCache;

    fn manager(config: SessionConfig) -> (SessionManager<MemoryCache>, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (
            SessionManager::with_shared(Arc::clone(&cache), config),
            cache,
        )
    }

    fn fields() -> SessionFields {
        SessionFields::new("u1@example.com", "analyst")
            .with_permissions(["reports:read", "reports:export"])
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (manager, _) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();

        let record = manager.get_session(&id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.principal_id, "u1");
        assert_eq!(record.role, "analyst");
        assert!(record.expires_at > Utc::now());
        assert!(record.expires_at > record.last_activity);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (manager, _) = manager(SessionConfig::default());

        let err = manager
            .create_session("   ", fields(), CreateOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = manager
            .create_session("u1", fields(), CreateOptions::new().with_ttl(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = manager
            .create_session("u1", fields(), CreateOptions::new().with_max_sessions(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_get_absent_is_none_not_error() {
        let (manager, _) = manager(SessionConfig::default());
        assert!(manager.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_reaps_record_past_logical_expiry() {
        // Simulates clock skew: the cache TTL still holds the key but the
        // stored expiresAt has passed.
        let (manager, cache) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let mut record = manager.get_session(&id).await.unwrap().unwrap();
        record.expires_at = Utc::now() - chrono::Duration::seconds(5);
        let raw = serde_json::to_string(&record).unwrap();
        cache
            .put(&format!("session:{id}"), &raw, Duration::from_secs(600))
            .await
            .unwrap();

        assert!(manager.get_session(&id).await.unwrap().is_none());
        // The stale key is gone, not just hidden.
        assert!(cache.get(&format!("session:{id}")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_sliding_strictly_extends_expiry() {
        let (manager, _) = manager(SessionConfig::default().with_ttl(Duration::from_secs(60)));

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let before = manager.get_session(&id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.touch_session(&id, true).await.unwrap());

        let after = manager.get_session(&id).await.unwrap().unwrap();
        assert!(after.expires_at > before.expires_at);
        assert!(after.last_activity > before.last_activity);
    }

    #[tokio::test]
    async fn test_sliding_touch_keeps_per_session_ttl() {
        // A session granted a longer lifetime at creation must keep it
        // across sliding renewals instead of snapping back to the manager
        // default.
        let (manager, _) = manager(SessionConfig::default().with_ttl(Duration::from_secs(60)));

        let id = manager
            .create_session(
                "u1",
                fields(),
                CreateOptions::new().with_ttl(Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        let before = manager.get_session(&id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.touch_session(&id, true).await.unwrap());

        let after = manager.get_session(&id).await.unwrap().unwrap();
        assert!(
            after.expires_at > before.expires_at,
            "sliding touch shrank expiry: before={} after={}",
            before.expires_at,
            after.expires_at
        );
        // Still roughly an hour out, not the 60-second default.
        assert!(after.remaining_ttl(Utc::now()) > Duration::from_secs(3000));
    }

    #[tokio::test]
    async fn test_touch_without_sliding_keeps_expiry() {
        let (manager, _) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let before = manager.get_session(&id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.touch_session(&id, false).await.unwrap());

        let after = manager.get_session(&id).await.unwrap().unwrap();
        assert_eq!(after.expires_at, before.expires_at);
        assert!(after.last_activity > before.last_activity);
    }

    #[tokio::test]
    async fn test_touch_absent_returns_false() {
        let (manager, _) = manager(SessionConfig::default());
        assert!(!manager.touch_session("nope", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_expiry() {
        let (manager, _) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let before = manager.get_session(&id).await.unwrap().unwrap();

        let updated = manager
            .update_session(
                &id,
                SessionUpdate::new()
                    .with_role("admin")
                    .with_permissions(["admin:all"]),
                false,
            )
            .await
            .unwrap();
        assert!(updated);

        let after = manager.get_session(&id).await.unwrap().unwrap();
        assert_eq!(after.role, "admin");
        assert!(after.permissions.contains("admin:all"));
        assert!(!after.permissions.contains("reports:read"));
        assert_eq!(after.principal_email, before.principal_email);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn test_validate_checks_permission_subset() {
        let (manager, _) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();

        assert!(manager.validate_session(&id, &[]).await.is_granted());
        assert!(
            manager
                .validate_session(&id, &["reports:read", "reports:export"])
                .await
                .is_granted()
        );

        match manager.validate_session(&id, &["admin:all"]).await {
            Access::Denied(DenyReason::MissingPermission(p)) => assert_eq!(p, "admin:all"),
            other => panic!("expected permission denial, got {other:?}"),
        }

        match manager.validate_session("nope", &[]).await {
            Access::Denied(DenyReason::NotFound) => {}
            other => panic!("expected not-found denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_with_sliding_config_renews() {
        let (manager, _) = manager(
            SessionConfig::default()
                .with_ttl(Duration::from_secs(60))
                .with_sliding(true),
        );

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let before = manager.get_session(&id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.validate_session(&id, &[]).await.is_granted());

        let after = manager.get_session(&id).await.unwrap().unwrap();
        assert!(after.expires_at > before.expires_at);
    }

    #[tokio::test]
    async fn test_delete_session_removes_record_and_index() {
        let (manager, _) = manager(SessionConfig::default());

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();

        assert!(manager.delete_session(&id).await.unwrap());
        assert!(manager.get_session(&id).await.unwrap().is_none());
        assert!(
            manager
                .list_principal_sessions("u1")
                .await
                .unwrap()
                .is_empty()
        );
        // Second delete is a clean false, not an error.
        assert!(!manager.delete_session(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_session_surfaces_errors() {
        let (manager, _) = manager(SessionConfig::default());

        let err = manager.require_session("nope", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let id = manager
            .create_session("u1", fields(), CreateOptions::new())
            .await
            .unwrap();
        let err = manager
            .require_session(&id, &["admin:all"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(manager.require_session(&id, &["reports:read"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_count_active() {
        let (manager, _) = manager(SessionConfig::default());

        for _ in 0..3 {
            manager
                .create_session("u1", fields(), CreateOptions::new())
                .await
                .unwrap();
        }
        assert_eq!(manager.count_active().await.unwrap(), 3);
    }
}
