//! Session record model and partial-update types.
//!
//! Records are persisted as flat JSON with stable camelCase field names so
//! any implementation sharing the cache can read the same keys.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One live authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Opaque, unguessable identifier. Allocated by the manager, never by
    /// callers.
    pub id: String,

    /// Identity that owns this session.
    pub principal_id: String,

    /// Email recorded at authentication time.
    pub principal_email: String,

    /// Role recorded at authentication time.
    pub role: String,

    /// Owning organization, when the principal belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Granted permission strings.
    #[serde(default)]
    pub permissions: HashSet<String>,

    /// Open caller-supplied context.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Lifetime granted at creation, in seconds. Sliding renewals re-grant
    /// this amount rather than the manager's configured default, so a
    /// session created with a longer per-call TTL keeps it across renewals.
    #[serde(default)]
    pub ttl_seconds: f64,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Whether the record's logical expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining logical lifetime, zero once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// First required permission this session lacks, if any.
    pub fn missing_permission<'a>(&self, required: &'a [&str]) -> Option<&'a str> {
        required
            .iter()
            .find(|p| !self.permissions.contains(**p))
            .copied()
    }

    /// Merge a partial update into this record.
    ///
    /// Only the whitelisted mutable fields can change; `id`, `principal_id`
    /// and `created_at` are not representable in [`SessionUpdate`]. Metadata
    /// merges key-by-key; permissions replace wholesale.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(email) = update.principal_email {
            self.principal_email = email;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(org) = update.organization_id {
            self.organization_id = Some(org);
        }
        if let Some(permissions) = update.permissions {
            self.permissions = permissions;
        }
        if let Some(metadata) = update.metadata {
            self.metadata.extend(metadata);
        }
    }
}

/// Caller-supplied identity and context for a new session.
///
/// Everything except the id and timestamps, which the manager allocates.
#[derive(Debug, Clone, Default)]
pub struct SessionFields {
    pub principal_email: String,
    pub role: String,
    pub organization_id: Option<String>,
    pub permissions: HashSet<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SessionFields {
    /// Create fields for a principal with the given email and role.
    pub fn new(principal_email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            principal_email: principal_email.into(),
            role: role.into(),
            ..Self::default()
        }
    }

    /// Set the owning organization.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Set the granted permissions.
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Explicit partial update for a session.
///
/// Lists only the mutable fields, so an update can never clobber the id or
/// creation timestamp. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub principal_email: Option<String>,
    pub role: Option<String>,
    pub organization_id: Option<String>,
    pub permissions: Option<HashSet<String>>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl SessionUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the recorded email.
    pub fn with_principal_email(mut self, email: impl Into<String>) -> Self {
        self.principal_email = Some(email.into());
        self
    }

    /// Change the role (e.g. a role change taking effect mid-session).
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Change the owning organization.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Replace the permission set.
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Merge a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Aggregate statistics over the live keyspace.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Live sessions at the time of the scan.
    pub active: usize,

    /// Live sessions per role.
    pub by_role: HashMap<String, usize>,

    /// Mean of `last_activity - created_at` across live sessions.
    pub avg_duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: "s-1".to_string(),
            principal_id: "u-1".to_string(),
            principal_email: "u1@example.com".to_string(),
            role: "analyst".to_string(),
            organization_id: None,
            permissions: ["reports:read".to_string()].into_iter().collect(),
            metadata: HashMap::new(),
            ttl_seconds: 60.0,
            created_at: now,
            last_activity: now,
            expires_at: now + chrono::Duration::seconds(60),
        }
    }

    #[test]
    fn test_round_trips_with_stable_field_names() {
        let json = serde_json::to_value(record()).unwrap();
        for field in [
            "id",
            "principalId",
            "principalEmail",
            "role",
            "permissions",
            "metadata",
            "ttlSeconds",
            "createdAt",
            "lastActivity",
            "expiresAt",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        // Absent organization is omitted, not null.
        assert!(json.get("organizationId").is_none());

        let back: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "s-1");
        assert_eq!(back.principal_id, "u-1");
    }

    #[test]
    fn test_missing_permission() {
        let record = record();
        assert_eq!(record.missing_permission(&[]), None);
        assert_eq!(record.missing_permission(&["reports:read"]), None);
        assert_eq!(
            record.missing_permission(&["reports:read", "admin:write"]),
            Some("admin:write")
        );
    }

    #[test]
    fn test_apply_merges_only_supplied_fields() {
        let mut record = record();
        record
            .metadata
            .insert("device".to_string(), serde_json::json!("laptop"));
        let created_at = record.created_at;

        record.apply(
            SessionUpdate::new()
                .with_role("admin")
                .with_metadata("ip", serde_json::json!("10.0.0.1")),
        );

        assert_eq!(record.role, "admin");
        assert_eq!(record.principal_email, "u1@example.com");
        assert_eq!(record.created_at, created_at);
        // Metadata merges rather than replaces.
        assert_eq!(record.metadata.len(), 2);
    }

    #[test]
    fn test_remaining_ttl_clamps_at_zero() {
        let record = record();
        assert_eq!(
            record.remaining_ttl(record.expires_at + chrono::Duration::seconds(5)),
            Duration::ZERO
        );
        assert!(record.remaining_ttl(Utc::now()) > Duration::from_secs(50));
    }
}
