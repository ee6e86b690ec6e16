//! Runtime configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The `Caching` section of the IronIDS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingConfig {
    /// Cache server address.
    pub host: String,
    /// Cache server port.
    pub port: u16,
    /// Namespace prefix for the storage key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Time-to-live in seconds passed to the client. Zero means no
    /// expiration (the memcached sentinel).
    #[serde(default = "default_expiration_time")]
    pub expiration_time: u32,
}

fn default_key_prefix() -> String {
    "ids".to_string()
}

fn default_expiration_time() -> u32 {
    600
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11211,
            key_prefix: default_key_prefix(),
            expiration_time: default_expiration_time(),
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdsConfig {
    /// The `Caching` section.
    #[serde(rename = "Caching", default)]
    pub caching: CachingConfig,
}

impl IdsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| Error::Configuration(e.to_string()))
    }
}
