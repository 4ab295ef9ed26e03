//! Cache configuration
//!
//! Configuration is plain JSON:
//!
//! ```json
//! { "name": "sessions", "capacity": 512 }
//! ```
//!
//! Both fields are optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Capacity used when the configuration does not set one
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Settings used to build a [`SharedCache`](crate::SharedCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Label attached to log events from this cache
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum entry count kept by eviction
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
        }
    }
}

impl CacheConfig {
    /// Config with the given capacity and default name
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parse configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the config file
    ///
    /// # Returns
    /// * `Result<CacheConfig>` - Parsed configuration
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
