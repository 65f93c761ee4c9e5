//! Session affinity storage.
//!
//! Maps session ids to pinned backend addresses across gateway replicas: a
//! process-local tier for fast lookups in front of a shared tier (Redis, or
//! in-memory for single-replica deployments) that every replica reads and
//! writes.

pub mod cache;
pub mod store;

pub use cache::{DistributedCache, InMemoryCache, RedisCache};
pub use store::{SessionBinding, SessionStore, TwoTierSessionStore};
