//! Configuration management for the transaction pipeline
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static::lazy_static! {
    static ref ENV_VAR: regex::Regex = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .expect("static regex is valid");
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub chain: ChainConfig,
    pub gas: GasConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    /// Run auxiliary queries concurrently with polling instead of after it
    pub prefetch_auxiliary: bool,
    pub hash_head: usize,
    pub hash_tail: usize,
    pub progress_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_poll_attempts: 20,
            prefetch_auxiliary: false,
            hash_head: 6,
            hash_tail: 6,
            progress_buffer: 16,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub network: String,
    pub explorer_url: String,
    pub native_denom: String,
    pub native_symbol: String,
    pub native_decimals: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: "phoenix-1".to_string(),
            explorer_url: "https://finder.terra.money".to_string(),
            native_denom: "uluna".to_string(),
            native_symbol: "Luna".to_string(),
            native_decimals: 6,
        }
    }
}

impl ChainConfig {
    /// Explorer page for a transaction hash
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!(
            "{}/{}/tx/{}",
            self.explorer_url.trim_end_matches('/'),
            self.network,
            tx_hash
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub gas_adjustment: Decimal,
    /// Fixed fee charged per transaction, in native base units
    pub fixed_fee: String,
    pub gas_wanted: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_adjustment: Decimal::new(16, 1),
            fixed_fee: "150000".to_string(),
            gas_wanted: 1_000_000,
        }
    }
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("MM_TX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.pipeline.max_poll_attempts == 0 {
            anyhow::bail!("pipeline.max_poll_attempts must be at least 1");
        }
        if self.pipeline.progress_buffer == 0 {
            anyhow::bail!("pipeline.progress_buffer must be at least 1");
        }
        if self.chain.native_denom.is_empty() {
            anyhow::bail!("chain.native_denom must not be empty");
        }
        if self.gas.gas_adjustment <= Decimal::ZERO {
            anyhow::bail!("gas.gas_adjustment must be positive");
        }
        if self.gas.fixed_fee.parse::<Decimal>().is_err() {
            anyhow::bail!("gas.fixed_fee is not a number: {}", self.gas.fixed_fee);
        }
        if self.chain.explorer_url.is_empty() {
            tracing::warn!("chain.explorer_url is empty - hash receipts will have relative links");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
