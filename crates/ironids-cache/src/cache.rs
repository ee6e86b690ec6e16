//! The filter storage cache facade.

use crate::backend::{self, CacheBackend};
use crate::keys::storage_key;
use ironids_core::{CachingConfig, Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Caching facade for the compiled filter storage snapshot.
///
/// Owns exactly one logical cache entry and brokers it through a connection
/// established at construction time. The `is_cached` flag records whether a
/// fetch has ever observed a non-empty snapshot; while it is set, writes
/// are suppressed. It is not a cache of the value itself, and a later miss
/// clears it again.
pub struct StorageCache {
    /// Caching-strategy tag supplied by the caller, kept for identification.
    kind: String,
    config: CachingConfig,
    is_cached: AtomicBool,
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for StorageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCache")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("is_cached", &self.is_cached)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl StorageCache {
    /// Connect to the cache server and build the facade.
    ///
    /// The connection is opened here, as a side effect of construction, not
    /// deferred to first use. Fails with a configuration error when `host`
    /// is empty or `port` is zero — in that case no connection is
    /// attempted — and with a backend error when the server is unreachable.
    /// Neither failure is retried at this layer.
    pub fn connect(kind: &str, config: CachingConfig) -> Result<Self> {
        if config.host.is_empty() || config.port == 0 {
            return Err(Error::Configuration(
                "insufficient connection parameters".to_string(),
            ));
        }
        let backend = backend::connect(&config.host, config.port)?;
        Ok(Self::assemble(kind, config, backend))
    }

    /// Build the facade over a pre-built backend.
    ///
    /// Seam for tests and local development; production callers go through
    /// [`StorageCache::connect`].
    pub fn with_backend(kind: &str, config: CachingConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self::assemble(kind, config, backend)
    }

    fn assemble(kind: &str, config: CachingConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            kind: kind.to_string(),
            config,
            is_cached: AtomicBool::new(false),
            backend,
        }
    }

    /// The caching-strategy tag this facade was built with.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether a previous fetch observed a non-empty snapshot.
    pub fn is_cached(&self) -> bool {
        self.is_cached.load(Ordering::Relaxed)
    }

    /// Write the filter storage snapshot.
    ///
    /// Suppressed (returns `self` unchanged) once a fetch has observed a
    /// non-empty snapshot; only a later fetch that misses reopens the write
    /// gate. A successful write does not mark the snapshot as cached —
    /// only [`StorageCache::get_cache`] moves the flag, so a set followed
    /// by a get still performs a real round trip. Backend failures
    /// propagate untouched. Returns `self` for chaining.
    pub fn set_cache(&self, data: &Value) -> Result<&Self> {
        if self.is_cached() {
            return Ok(self);
        }
        let key = storage_key(&self.config.key_prefix);
        self.backend.set(&key, data, self.config.expiration_time)?;
        debug!(key = %key, ttl = self.config.expiration_time, "filter storage written");
        Ok(self)
    }

    /// Fetch the filter storage snapshot.
    ///
    /// Always a real round trip; only the emptiness verdict is remembered,
    /// never the value. `null`, `false`, `0`, the empty string and empty
    /// arrays/objects count as empty, as does a plain miss. Returns `None`
    /// on a miss — indistinguishable from "nothing cached yet" unless the
    /// caller inspects a propagated error separately.
    pub fn get_cache(&self) -> Result<Option<Value>> {
        let key = storage_key(&self.config.key_prefix);
        let data = self.backend.get(&key)?;
        let hit = !is_empty(data.as_ref());
        self.is_cached.store(hit, Ordering::Relaxed);
        debug!(key = %key, hit, "filter storage fetched");
        Ok(data)
    }
}

fn is_empty(data: Option<&Value>) -> bool {
    match data {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v == 0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

static SHARED: OnceLock<Arc<StorageCache>> = OnceLock::new();

/// Process-wide shared cache instance.
///
/// Built on the first call; every later call returns that same instance and
/// silently ignores its arguments. The instance, its connection and its
/// `is_cached` state live until process exit — there is no teardown or
/// reset path. Callers that need isolated state construct their own facade
/// with [`StorageCache::connect`] instead.
pub fn shared_instance(kind: &str, config: CachingConfig) -> Result<Arc<StorageCache>> {
    shared_instance_with(|| StorageCache::connect(kind, config))
}

/// Variant of [`shared_instance`] taking an initializer, for callers that
/// assemble their own backend. The initializer runs only if no shared
/// instance exists yet; its failure leaves the slot empty for a later
/// attempt.
pub fn shared_instance_with<F>(init: F) -> Result<Arc<StorageCache>>
where
    F: FnOnce() -> Result<StorageCache>,
{
    if let Some(cache) = SHARED.get() {
        return Ok(Arc::clone(cache));
    }
    let cache = Arc::new(init()?);
    Ok(Arc::clone(SHARED.get_or_init(|| cache)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn config(prefix: &str) -> CachingConfig {
        CachingConfig {
            host: "127.0.0.1".to_string(),
            port: 11211,
            key_prefix: prefix.to_string(),
            expiration_time: 3600,
        }
    }

    fn facade(prefix: &str) -> (StorageCache, Arc<MemoryBackend>) {
        let store = Arc::new(MemoryBackend::new());
        let cache = StorageCache::with_backend("memcached", config(prefix), store.clone());
        (cache, store)
    }

    #[test]
    fn test_missing_host_is_fatal() {
        let cfg = CachingConfig {
            host: String::new(),
            ..config("ids")
        };
        let err = StorageCache::connect("memcached", cfg).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_zero_port_is_fatal() {
        let cfg = CachingConfig {
            port: 0,
            ..config("ids")
        };
        let err = StorageCache::connect("memcached", cfg).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_key_shape() {
        let (cache, store) = facade("app");
        cache.set_cache(&json!({"x": 1})).unwrap();
        assert_eq!(store.get("app.storage").unwrap(), Some(json!({"x": 1})));
    }

    #[test]
    fn test_set_before_any_get_overwrites() {
        // The write gate only closes after a fetch observes data, so two
        // writes on a fresh facade both reach the backend.
        let (cache, store) = facade("ids");
        cache.set_cache(&json!({"v": "a"})).unwrap();
        cache.set_cache(&json!({"v": "b"})).unwrap();
        assert_eq!(store.get("ids.storage").unwrap(), Some(json!({"v": "b"})));
    }

    #[test]
    fn test_set_does_not_mark_cached() {
        let (cache, _store) = facade("ids");
        cache.set_cache(&json!({"filters": [1]})).unwrap();
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_get_flips_flag_both_directions() {
        let (cache, store) = facade("ids");
        cache.set_cache(&json!({"filters": [1]})).unwrap();

        assert_eq!(cache.get_cache().unwrap(), Some(json!({"filters": [1]})));
        assert!(cache.is_cached());

        store.evict("ids.storage");
        assert_eq!(cache.get_cache().unwrap(), None);
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_set_after_hit_is_suppressed() {
        let (cache, store) = facade("ids");
        cache.set_cache(&json!({"v": "original"})).unwrap();
        cache.get_cache().unwrap();
        assert!(cache.is_cached());

        cache.set_cache(&json!({"v": "update"})).unwrap();
        assert_eq!(
            store.get("ids.storage").unwrap(),
            Some(json!({"v": "original"}))
        );
        assert_eq!(cache.get_cache().unwrap(), Some(json!({"v": "original"})));
    }

    #[test]
    fn test_empty_values_do_not_mark_cached() {
        for empty in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            let (cache, _store) = facade("ids");
            cache.set_cache(&empty).unwrap();
            assert_eq!(cache.get_cache().unwrap(), Some(empty));
            assert!(!cache.is_cached());
        }
    }

    #[test]
    fn test_set_chaining() {
        let (cache, store) = facade("ids");
        cache
            .set_cache(&json!({"step": 1}))
            .unwrap()
            .set_cache(&json!({"step": 2}))
            .unwrap();
        assert_eq!(store.get("ids.storage").unwrap(), Some(json!({"step": 2})));
    }

    #[test]
    fn test_kind_is_kept() {
        let (cache, _store) = facade("ids");
        assert_eq!(cache.kind(), "memcached");
    }
}
