use promptvault_core::{ContentDraft, Version};
use promptvault_engine::{EngineError, PromptVault, VaultConfig};
use tempfile::TempDir;

use std::ops::Deref;

/// A vault plus whatever backs it; the backing file lives as long as this.
pub struct TestVault {
    pub vault: PromptVault,
    _dir: Option<TempDir>,
}

impl TestVault {
    /// Single-connection in-memory vault.
    pub fn memory() -> Result<Self, EngineError> {
        Ok(Self {
            vault: PromptVault::in_memory()?,
            _dir: None,
        })
    }

    /// File-backed vault with a real connection pool, for concurrency tests.
    pub fn file(max_connections: u32) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut config = VaultConfig::default();
        config.store.path = dir.path().join("vault.db").to_string_lossy().into_owned();
        config.store.max_connections = max_connections;
        config.store.acquire_timeout_ms = 30_000;
        Ok(Self {
            vault: PromptVault::open(&config)?,
            _dir: Some(dir),
        })
    }

    /// Create a version with only a system prompt.
    pub fn create(&self, node_name: &str, system: &str) -> Result<Version, EngineError> {
        self.vault
            .create_version(node_name, &ContentDraft::new(system), None)
    }

    /// Create a version with all three roles.
    pub fn create_full(
        &self,
        node_name: &str,
        system: &str,
        user: &str,
        assistant: &str,
        message: Option<&str>,
    ) -> Result<Version, EngineError> {
        let draft = ContentDraft::new(system)
            .with_user(user)
            .with_assistant(assistant);
        self.vault.create_version(node_name, &draft, message)
    }
}

impl Deref for TestVault {
    type Target = PromptVault;

    fn deref(&self) -> &PromptVault {
        &self.vault
    }
}
