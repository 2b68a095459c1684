use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Json,
    Sqlite,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown storage backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Data directory for `json`, database file for `sqlite`
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: PathBuf::from("ladder-data"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub lock_timeout_ms: u64,
}

impl GuardSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub top_characters_limit: usize,
    /// Falls back to the bundled catalog when unset
    pub characters_path: Option<PathBuf>,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            top_characters_limit: 10,
            characters_path: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub guard: GuardSettings,
    pub stats: StatsSettings,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `LADDER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Some(backend) = read_env("LADDER_BACKEND") {
            config.storage.backend = backend.parse()?;
        }
        if let Some(path) = read_env("LADDER_DATA_PATH") {
            config.storage.path = PathBuf::from(path);
        }
        if let Some(timeout) = read_env("LADDER_LOCK_TIMEOUT_MS") {
            config.guard.lock_timeout_ms = timeout
                .parse()
                .with_context(|| format!("Invalid LADDER_LOCK_TIMEOUT_MS: {}", timeout))?;
        }
        if let Some(path) = read_env("LADDER_CHARACTERS") {
            config.stats.characters_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
