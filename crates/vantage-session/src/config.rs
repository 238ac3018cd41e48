//! Configuration for the session manager.

use std::time::Duration;

/// Default session lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default deadline for any single cache call.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval for the background sweep task.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime granted to new sessions (and to sliding renewals).
    pub ttl: Duration,

    /// Whether successful validation renews the session (sliding expiration).
    pub sliding: bool,

    /// Per-principal concurrent session bound. `None` means unbounded.
    /// Enforcement is best-effort under concurrent creations.
    pub max_sessions: Option<usize>,

    /// Deadline applied to every cache call. Validation paths fail closed
    /// when it elapses.
    pub op_timeout: Duration,

    /// Interval for the background sweep task.
    pub sweep_interval: Duration,

    /// Key prefix for primary session records.
    pub key_prefix: String,

    /// Key prefix for per-principal secondary indexes.
    pub index_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sliding: false,
            max_sessions: None,
            op_timeout: DEFAULT_OP_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            key_prefix: "session".to_string(),
            index_prefix: "principal-sessions".to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable sliding expiration on validation.
    pub fn with_sliding(mut self, sliding: bool) -> Self {
        self.sliding = sliding;
        self
    }

    /// Bound the number of concurrent sessions per principal.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Set the per-call cache deadline.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Set the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Per-call overrides for session creation.
///
/// Unset fields fall back to the manager's [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Lifetime for this session.
    pub ttl: Option<Duration>,

    /// Per-principal session bound to enforce at creation.
    pub max_sessions: Option<usize>,
}

impl CreateOptions {
    /// Options that defer entirely to the manager configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Override the per-principal session bound.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }
}
