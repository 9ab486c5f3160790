//! Server-side configuration.
//!
//! Reads `/etc/stampd/<name>.toml`, or an explicit path when the
//! argument contains `/` or `.`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Server configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub production: ProductionSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the kv and sqlite database files.
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Application secret for token signing and key derivation. Must
    /// be stable across restarts and identical on every worker.
    pub app_secret: String,
}

/// `[production]` section; every field has a serve-ready default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductionSection {
    pub serial_prefix: String,
    pub chunk_size: u32,
    pub job_timeout_secs: u64,
}

impl Default for ProductionSection {
    fn default() -> Self {
        Self {
            serial_prefix: "KBS".to_string(),
            chunk_size: 1000,
            job_timeout_secs: 3600,
        }
    }
}

impl ServerConfig {
    /// Resolve a context name or path to a config file path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from("/etc/stampd").join(format!("{name_or_path}.toml"))
        }
    }

    /// Load config from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
