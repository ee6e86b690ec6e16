//! Cache backend variants behind one capability interface.
//!
//! The facade talks to exactly one of a closed set of backends. The variant
//! is resolved once, when the connection is established, and the resolved
//! implementation is stored; no per-call capability checks.

use ironids_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait every backend variant implements.
///
/// Values cross this seam as structured JSON; each variant serializes them
/// before the wire call and lets the client crate own the wire encoding.
pub trait CacheBackend: Send + Sync {
    /// Write `value` under `key` with a TTL in seconds (zero disables
    /// expiration).
    fn set(&self, key: &str, value: &Value, ttl: u32) -> Result<()>;

    /// Fetch the value stored under `key`, or `None` on a miss.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Short tag naming the variant, for logging.
    fn name(&self) -> &'static str;
}

/// Resolve a backend for `(host, port)`.
///
/// Probes the binary protocol once; a server that does not answer it gets
/// the persistent text-protocol variant instead. Whichever variant wins is
/// held for the lifetime of the connection and never re-probed. A failure
/// to establish either connection propagates; there is no retry loop.
pub fn connect(host: &str, port: u16) -> Result<Arc<dyn CacheBackend>> {
    if let Ok(backend) = PooledBackend::connect(host, port) {
        debug!(host, port, variant = backend.name(), "cache backend resolved");
        return Ok(Arc::new(backend));
    }
    let backend = PersistentBackend::connect(host, port)?;
    debug!(host, port, variant = backend.name(), "cache backend resolved");
    Ok(Arc::new(backend))
}

/// Pooled binary-protocol client. The `(host, port)` endpoint is registered
/// into the connection pool when the client is built.
pub struct PooledBackend {
    client: memcache::Client,
}

const POOL_SIZE: u32 = 4;

impl PooledBackend {
    /// Build the pool and verify the server speaks the binary protocol.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let url = format!("memcache://{host}:{port}?protocol=binary");
        let client = memcache::Client::with_pool_size(url, POOL_SIZE).map_err(backend_err)?;
        client.version().map_err(backend_err)?;
        Ok(Self { client })
    }
}

impl CacheBackend for PooledBackend {
    fn set(&self, key: &str, value: &Value, ttl: u32) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.client
            .set(key, payload.as_str(), ttl)
            .map_err(backend_err)
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self.client.get(key).map_err(backend_err)?;
        decode(raw)
    }

    fn name(&self) -> &'static str {
        "pooled-binary"
    }
}

/// Single persistent text-protocol connection.
///
/// The text protocol carries a flags word between value and expiration;
/// this variant pins it to zero explicitly on every write. The binary
/// variant has no such word in its call shape.
pub struct PersistentBackend {
    client: memcache::Client,
}

impl PersistentBackend {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let url = format!("memcache://{host}:{port}?protocol=ascii&tcp_nodelay=true");
        let client = memcache::Client::with_pool_size(url, 1).map_err(backend_err)?;
        client.version().map_err(backend_err)?;
        Ok(Self { client })
    }
}

/// JSON payload for the text protocol, flags word pinned to zero.
struct TextPayload<'a>(&'a str);

impl<W: std::io::Write> memcache::ToMemcacheValue<W> for TextPayload<'_> {
    fn get_flags(&self) -> u32 {
        0
    }

    fn get_length(&self) -> usize {
        self.0.len()
    }

    fn write_to(&self, stream: &mut W) -> std::io::Result<()> {
        stream.write_all(self.0.as_bytes())
    }
}

impl CacheBackend for PersistentBackend {
    fn set(&self, key: &str, value: &Value, ttl: u32) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.client
            .set(key, TextPayload(&payload), ttl)
            .map_err(backend_err)
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self.client.get(key).map_err(backend_err)?;
        decode(raw)
    }

    fn name(&self) -> &'static str {
        "persistent-text"
    }
}

/// In-process map backend for tests and local development.
///
/// TTLs are accepted but not enforced; entries live until evicted.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an entry out-of-band, the way an expired or evicted server
    /// entry disappears.
    pub fn evict(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

impl CacheBackend for MemoryBackend {
    fn set(&self, key: &str, value: &Value, _ttl: u32) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn decode(raw: Option<String>) -> Result<Option<Value>> {
    match raw {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}

fn backend_err(err: memcache::MemcacheError) -> Error {
    Error::Backend(err.to_string())
}
