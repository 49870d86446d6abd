use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use relay_dest::{ConfirmationPolicy, HEADER_SYNC_CONTRACT, NODE_MANAGER_CONTRACT};
use relay_types::{Address, ChainId};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Settings as read from the config file and `RELAY_*` environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawConfig {
    source_rpc_url: String,
    dest_rpc_url: String,
    source_chain_id: u64,
    request_timeout_secs: u64,
    poll_interval_secs: u64,
    wait_deadline_secs: Option<u64>,
    confirm_poll_interval_secs: u64,
    confirm_timeout_secs: u64,
    confirm_attempts: u32,
    log_level: String,
    log_format: String,
    node_manager_contract: String,
    header_sync_contract: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            source_rpc_url: "http://127.0.0.1:4201".into(),
            dest_rpc_url: "http://127.0.0.1:20336".into(),
            source_chain_id: 333,
            request_timeout_secs: 30,
            poll_interval_secs: 20,
            wait_deadline_secs: None,
            confirm_poll_interval_secs: 1,
            confirm_timeout_secs: 60,
            confirm_attempts: 30,
            log_level: "info".into(),
            log_format: "pretty".into(),
            node_manager_contract: NODE_MANAGER_CONTRACT.to_hex_string(),
            header_sync_contract: HEADER_SYNC_CONTRACT.to_hex_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub config_path: Option<PathBuf>,
    pub source_rpc_url: String,
    pub dest_rpc_url: String,
    pub source_chain_id: ChainId,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub wait_deadline: Option<Duration>,
    pub confirmation: ConfirmationPolicy,
    pub confirm_attempts: u32,
    pub log_level: String,
    pub log_format: String,
    pub node_manager_contract: Address,
    pub header_sync_contract: Address,
}

impl RelayConfig {
    /// Load `path` (or `./config.json` when present) under the environment.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("configuration file {} not found", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix("RELAY"));

        let raw: RawConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid relay configuration")?;
        let config = Self::from_raw(raw, resolved)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let node_manager_contract = Address::from_hex_string(&raw.node_manager_contract)
            .with_context(|| format!("node_manager_contract {}", raw.node_manager_contract))?;
        let header_sync_contract = Address::from_hex_string(&raw.header_sync_contract)
            .with_context(|| format!("header_sync_contract {}", raw.header_sync_contract))?;

        Ok(Self {
            config_path,
            source_rpc_url: raw.source_rpc_url.trim().to_string(),
            dest_rpc_url: raw.dest_rpc_url.trim().to_string(),
            source_chain_id: ChainId(raw.source_chain_id),
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            poll_interval: Duration::from_secs(raw.poll_interval_secs),
            wait_deadline: raw.wait_deadline_secs.map(Duration::from_secs),
            confirmation: ConfirmationPolicy {
                poll_interval: Duration::from_secs(raw.confirm_poll_interval_secs),
                timeout: Duration::from_secs(raw.confirm_timeout_secs),
            },
            confirm_attempts: raw.confirm_attempts,
            log_level: raw.log_level,
            log_format: raw.log_format.to_lowercase(),
            node_manager_contract,
            header_sync_contract,
        })
    }

    fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("source_rpc_url", &self.source_rpc_url),
            ("dest_rpc_url", &self.dest_rpc_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{name} must be an http(s) URL, got '{url}'");
            }
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.confirmation.poll_interval.is_zero() {
            anyhow::bail!("confirm_poll_interval_secs must be greater than zero");
        }
        if self.confirmation.timeout < self.confirmation.poll_interval {
            anyhow::bail!("confirm_timeout_secs must not be shorter than the poll interval");
        }
        if self.confirm_attempts == 0 {
            anyhow::bail!("confirm_attempts must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("log_format must be 'pretty' or 'json'");
        }
        Ok(())
    }
}
