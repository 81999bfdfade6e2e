use std::path::{Path, PathBuf};
use std::time::Duration;

use promptvault_core::{RoleOrderPolicy, paging::MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub store: StoreConfig,
    pub versions: VersionsConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    pub role_order: RoleOrderPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "promptvault.db".into(),
            max_connections: 4,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl VaultConfig {
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.store.path = MEMORY_PATH.into();
        config
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: VaultConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::Invalid("store.path cannot be empty".into()));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "store.max_connections must be at least 1".into(),
            ));
        }
        if self.store.acquire_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.acquire_timeout_ms must be positive".into(),
            ));
        }
        if self.registry.page_size == 0 || self.registry.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "registry.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn location(&self) -> StoreLocation {
        if self.store.path == MEMORY_PATH {
            StoreLocation::Memory
        } else {
            StoreLocation::File(PathBuf::from(&self.store.path))
        }
    }

    /// A memory store lives inside one connection, so it never pools.
    pub fn pool_size(&self) -> u32 {
        match self.location() {
            StoreLocation::Memory => 1,
            StoreLocation::File(_) => self.store.max_connections,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.store.acquire_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = VaultConfig::default();
        config.validate().unwrap();
        assert_eq!(config.versions.role_order, RoleOrderPolicy::UserFirst);
        assert_eq!(config.location(), StoreLocation::File("promptvault.db".into()));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = VaultConfig::from_toml(
            r#"
            [store]
            path = ":memory:"

            [versions]
            role_order = "assistant_first"
            "#,
        )
        .unwrap();
        assert_eq!(config.location(), StoreLocation::Memory);
        assert_eq!(config.pool_size(), 1);
        assert_eq!(config.versions.role_order, RoleOrderPolicy::AssistantFirst);
        assert_eq!(config.registry.page_size, 10);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for bad in [
            "[store]\nmax_connections = 0",
            "[store]\nacquire_timeout_ms = 0",
            "[registry]\npage_size = 101",
            "[store]\npath = \" \"",
        ] {
            assert!(matches!(
                VaultConfig::from_toml(bad),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[test]
    fn unknown_role_order_is_a_parse_error() {
        assert!(matches!(
            VaultConfig::from_toml("[versions]\nrole_order = \"sideways\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("promptvault.toml");
        std::fs::write(&path, "[registry]\npage_size = 25\n")?;
        assert_eq!(VaultConfig::load(&path)?.registry.page_size, 25);

        let missing = VaultConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
        Ok(())
    }
}
