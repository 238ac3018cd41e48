//! Shared cache primitive for the Vantage session store.
//!
//! This crate abstracts the handful of atomic operations the session layer
//! needs from a shared cache:
//! - single-key get / put-with-TTL / delete
//! - atomic add/remove on per-key ordered sets (used as secondary indexes)
//! - prefix scans for maintenance passes
//!
//! Two backends are provided: [`RedisCache`] for the shared deployment case
//! and [`MemoryCache`] for tests and single-process use.

mod backend;
mod error;
mod memory;
mod redis;

pub use backend::CacheBackend;
pub use error::{CacheError, Result};
pub use memory::MemoryCache;
pub use self::redis::RedisCache;
