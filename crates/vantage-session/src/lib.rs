//! TTL-bound session and credential store for Vantage.
//!
//! Holds authenticated-principal state in a shared cache so any number of
//! request-handling processes see the same sessions. The store provides:
//! - sliding or fixed expiration, enforced both by cache TTL and by a
//!   logical `expiresAt` double-check
//! - a per-principal secondary index for listing, bulk revocation and
//!   oldest-first eviction under a per-principal session bound
//! - fail-closed validation for the access-control hot path
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage_cache::MemoryCache;
//! use vantage_session::{CreateOptions, SessionConfig, SessionFields, SessionManager};
//!
//! let config = SessionConfig::new()
//!     .with_ttl(Duration::from_secs(3600))
//!     .with_sliding(true)
//!     .with_max_sessions(5);
//!
//! let manager = SessionManager::new(MemoryCache::new(), config);
//! let id = manager
//!     .create_session("u1", SessionFields::new("u1@example.com", "analyst"), CreateOptions::new())
//!     .await?;
//! ```

mod config;
mod error;
mod manager;
mod record;

pub use config::{
    CreateOptions, DEFAULT_OP_TIMEOUT, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, SessionConfig,
};
pub use error::{Error, Result};
pub use manager::{Access, DenyReason, SessionManager};
pub use record::{SessionFields, SessionRecord, SessionStats, SessionUpdate};
