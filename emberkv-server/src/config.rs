//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via EMBERKV_CONFIG)
//! 3. Environment variables

use emberkv_cache::CacheConfig;
use emberkv_wal::WalConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Cache configuration.
    pub cache: CacheSettings,
    /// Storage / durability configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("EMBERKV_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.cache.apply_env_overrides();
        self.storage.apply_env_overrides();
    }

    /// Builds the cache configuration, including the WAL section when
    /// durability is enabled.
    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new(self.cache.capacity);
        if let Some(wal) = self.storage.wal_config() {
            config = config.with_wal(wal);
        }
        config
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7420".parse().unwrap(),
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("EMBERKV_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of resident entries.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl CacheSettings {
    fn apply_env_overrides(&mut self) {
        if let Ok(capacity) = std::env::var("EMBERKV_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.capacity = n;
            }
        }
    }
}

/// Storage / durability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; the WAL lives in its `wal` subdirectory.
    pub data_dir: PathBuf,
    /// Whether to write a WAL at all. Disabled means a purely volatile cache.
    pub wal_enabled: bool,
    /// Fsync on every append instead of relying on the periodic sync task.
    pub force_sync: bool,
    /// WAL segment size in megabytes before rotation.
    pub wal_max_file_size_mb: u64,
    /// Maximum number of retained WAL segments.
    pub wal_max_segments: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            wal_enabled: true,
            force_sync: false,
            wal_max_file_size_mb: 16,
            wal_max_segments: 10,
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("EMBERKV_DATA") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(enabled) = std::env::var("EMBERKV_WAL_ENABLED") {
            self.wal_enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }

        if let Ok(force) = std::env::var("EMBERKV_FORCE_SYNC") {
            self.force_sync = force == "1" || force.to_lowercase() == "true";
        }

        if let Ok(size) = std::env::var("EMBERKV_WAL_MAX_FILE_SIZE_MB") {
            if let Ok(mb) = size.parse() {
                self.wal_max_file_size_mb = mb;
            }
        }

        if let Ok(max) = std::env::var("EMBERKV_WAL_MAX_SEGMENTS") {
            if let Ok(n) = max.parse() {
                self.wal_max_segments = n;
            }
        }
    }

    /// Returns the WAL segment size threshold in bytes.
    pub fn wal_max_file_size(&self) -> u64 {
        self.wal_max_file_size_mb * 1024 * 1024
    }

    /// Returns the WAL directory path.
    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join("wal")
    }

    /// Returns the WAL configuration, or `None` when durability is disabled.
    pub fn wal_config(&self) -> Option<WalConfig> {
        if !self.wal_enabled {
            return None;
        }
        Some(
            WalConfig::new(self.wal_dir())
                .with_force_sync(self.force_sync)
                .with_max_file_size(self.wal_max_file_size())
                .with_max_segments(self.wal_max_segments),
        )
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
