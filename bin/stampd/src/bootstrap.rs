//! First-start checks.
//!
//! The server refuses to start on a configuration that would issue
//! unverifiable material (empty secret) or has nowhere to store it.

use crate::config::ServerConfig;

/// Verify server configuration is ready for production use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.security.app_secret.is_empty() {
        anyhow::bail!(
            "No application secret found in configuration.\n\
             Set [security] app_secret before starting the server."
        );
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.production.chunk_size == 0 {
        anyhow::bail!("Production chunk_size must be greater than zero.");
    }
    Ok(())
}
