//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/readnest.sqlite"
//! timeout_ms = 2000
//!
//! [fallback]
//! dir = "./data/fallback"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [auth.tokens]
//! "dev-token" = "user-1"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub fallback: FallbackConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Primary relational store.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Upper bound for a single primary call before it counts as failed.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_timeout_ms() -> u64 {
    2000
}
fn default_max_connections() -> u32 {
    5
}

impl DbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Bearer token → user id table for the static authenticator.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.timeout_ms == 0 {
        anyhow::bail!("db.timeout_ms must be > 0");
    }

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    for (token, user) in &config.auth.tokens {
        if token.trim().is_empty() {
            anyhow::bail!("auth.tokens must not contain an empty token");
        }
        if user.trim().is_empty() {
            anyhow::bail!("auth.tokens entry maps to an empty user id");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "/tmp/readnest.sqlite"

[fallback]
dir = "/tmp/readnest-fallback"

[server]
bind = "127.0.0.1:0"
"#;

    #[test]
    fn defaults_apply() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.db.timeout(), Duration::from_millis(2000));
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.logging.filter, "info");
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.db.timeout_ms = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn token_table_parses() {
        let text = format!("{MINIMAL}\n[auth.tokens]\n\"abc\" = \"user-1\"\n");
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config.auth.tokens["abc"], "user-1");
    }

    #[test]
    fn example_config_is_valid() {
        let text = include_str!("../config/readnest.example.toml");
        let config: Config = toml::from_str(text).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.auth.tokens["dev-token"], "user-1");
    }

    #[test]
    fn blank_user_is_rejected() {
        let text = format!("{MINIMAL}\n[auth.tokens]\n\"abc\" = \" \"\n");
        let config: Config = toml::from_str(&text).unwrap();
        assert!(validate(&config).is_err());
    }
}
