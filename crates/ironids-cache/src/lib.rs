//! Filter storage cache for IronIDS (memcached-family backends).
//!
//! The compiled filter storage is expensive to rebuild, so it is persisted
//! through a remote cache server and survives process restarts. This crate
//! owns that single cache entry: a facade with get/set semantics, a
//! write-suppression flag, and a process-wide shared instance, over a
//! backend variant resolved once at connect time.

pub mod backend;
pub mod cache;
pub mod keys;

pub use backend::{CacheBackend, MemoryBackend, PersistentBackend, PooledBackend};
pub use cache::{StorageCache, shared_instance, shared_instance_with};
pub use keys::storage_key;
