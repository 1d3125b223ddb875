//! Node configuration loaded from TOML

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use std::path::{Path, PathBuf};

use crate::blockchain::{Address, LedgerParams};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "LEDGER_CONFIG";

/// File looked up in the working directory when `LEDGER_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "ledger.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub miner: MinerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Ledger rules and genesis reward
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    #[serde(flatten)]
    pub params: LedgerParams,

    /// Wallet rewarded by the genesis block
    pub genesis_miner: Option<Address>,
}

/// In-process miner configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub enabled: bool,

    /// Hex encoded secret key of the miner wallet; a fresh wallet is created when absent
    pub secret_key: Option<String>,

    /// Wait between template polls while there is nothing to mine
    pub poll_interval_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            enabled: false,
            secret_key: None,
            poll_interval_ms: 2000,
        }
    }
}

impl NodeConfig {
    /// Loads the configuration named by `LEDGER_CONFIG`, else `ledger.toml` if present, else defaults
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.params, LedgerParams::default());
        assert!(config.ledger.genesis_miner.is_none());
        assert!(!config.miner.enabled);
    }

    #[test]
    fn test_partial_config() {
        let config = NodeConfig::from_toml(
            r#"
            [server]
            port = 8080

            [ledger]
            tx_per_block = 5
            genesis_miner = "abc"

            [miner]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ledger.params.tx_per_block, 5);
        assert_eq!(config.ledger.params.difficulty_factor, 10);
        assert_eq!(config.ledger.genesis_miner, Some(Address::from("abc")));
        assert!(config.miner.enabled);
        assert_eq!(config.miner.poll_interval_ms, 2000);
    }

    #[test]
    fn test_invalid_config() {
        assert!(NodeConfig::from_toml("[server]\nport = \"high\"").is_err());
        assert!(NodeConfig::from_file("/nonexistent/ledger.toml").is_err());
    }
}
