use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for cards and the transfer ledger
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Transfer engine tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    /// Upper bound on waiting for a card row lock before reporting a conflict
    pub lock_timeout_ms: u64,
    /// History page size when the caller does not pass a limit
    pub history_default_limit: u32,
    pub history_max_limit: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2_000,
            history_default_limit: 50,
            history_max_limit: 200,
        }
    }
}

impl TransferConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Clamp a requested history limit into `[1, history_max_limit]`
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.history_default_limit)
            .clamp(1, self.history_max_limit.max(1))
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`; `DATABASE_URL` overrides `postgres_url`
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            config.postgres_url = Some(url);
        }

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
