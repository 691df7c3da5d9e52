// rest_api/src/config.rs

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use notifications::MailConfig;

pub const DEFAULT_CONFIG_PATH: &str = "hms_config.yaml";

/// Server configuration, loaded from `hms_config.yaml` when present and
/// falling back to development defaults otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_directory: String,
    pub reports_directory: String,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub mail: MailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8082,
            data_directory: "hms_data".to_string(),
            reports_directory: "reports".to_string(),
            // Development fallback; override via config file or HMS_JWT_SECRET.
            jwt_secret: "change_this_to_a_real_secret_of_32_bytes".to_string(),
            token_ttl_secs: 60 * 60 * 24,
            mail: MailConfig::default(),
        }
    }
}

/// Loads the server configuration. A missing file yields defaults; a file
/// that exists but fails to parse is an error.
pub fn load_server_config(config_file_path: Option<PathBuf>) -> Result<ServerConfig> {
    let path = config_file_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml2::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
        })?
    } else {
        ServerConfig::default()
    };

    if let Ok(secret) = std::env::var("HMS_JWT_SECRET") {
        if !secret.is_empty() {
            config.jwt_secret = secret;
        }
    }
    Ok(config)
}
