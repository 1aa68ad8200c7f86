//! Configuration management for the Trato client
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkOptions,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub wallet: WalletConfig,
    pub deployment: Option<DeploymentConfig>,
}

/// Node connection options injected into every component
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkOptions {
    /// Primary RPC URL
    pub provider: String,
    /// Extra RPC URLs used for reads when the primary fails
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    /// Chain id used for EIP-155 signing
    pub network: u64,
    /// Decimals of the native currency
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl NetworkOptions {
    pub fn new(provider: impl Into<String>, network: u64, decimals: u32) -> Self {
        Self {
            provider: provider.into(),
            fallback_providers: Vec::new(),
            network,
            decimals,
        }
    }

    pub fn rpc_urls(&self) -> Vec<&str> {
        std::iter::once(self.provider.as_str())
            .chain(self.fallback_providers.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GasPriceStrategy {
    Fixed,
    Oracle,
    Node,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub strategy: GasPriceStrategy,
    /// Fee-oracle URL returning `{"fastest": ...}`
    pub oracle_url: Option<String>,
    pub oracle_timeout_ms: u64,
    /// Static price for `fixed`, fallback price for `oracle`
    pub fallback_gwei: Option<u64>,
    pub gas_limit_buffer_percent: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            strategy: GasPriceStrategy::Fixed,
            oracle_url: None,
            oracle_timeout_ms: 5_000,
            fallback_gwei: Some(32),
            gas_limit_buffer_percent: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
}

impl SubmissionConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Address of the deploying account
    pub address: String,
    /// Name of the environment variable holding the hex private key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// solc standard-JSON output file
    pub artifact_path: PathBuf,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_contract")]
    pub contract: String,
    #[serde(default)]
    pub constructor_args: Vec<String>,
    /// Amount sent to the contract after deployment, in display units
    pub fund_amount: Option<String>,
}

fn default_decimals() -> u32 {
    18
}

fn default_source() -> String {
    "Trato.sol".to_string()
}

fn default_contract() -> String {
    "Trato".to_string()
}

impl Settings {
    /// Load settings from the file named by `TRATO_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("TRATO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.network.provider.is_empty() {
            anyhow::bail!("network.provider must not be empty");
        }
        if self.network.network == 0 {
            anyhow::bail!("network.network (chain id) must not be zero");
        }
        // 10^78 no longer fits in 256 bits
        if self.network.decimals > 77 {
            anyhow::bail!("network.decimals must be at most 77");
        }
        if self.submission.receipt_timeout_secs == 0 || self.submission.receipt_poll_interval_ms == 0
        {
            anyhow::bail!("submission timeouts must be positive");
        }

        match self.gas.strategy {
            GasPriceStrategy::Oracle if self.gas.oracle_url.is_none() => {
                anyhow::bail!("gas.strategy = \"oracle\" requires gas.oracle_url");
            }
            GasPriceStrategy::Fixed if self.gas.fallback_gwei.is_none() => {
                anyhow::bail!("gas.strategy = \"fixed\" requires gas.fallback_gwei");
            }
            GasPriceStrategy::Oracle if self.gas.fallback_gwei.is_none() => {
                tracing::warn!("No gas fallback configured - oracle outages will abort submissions");
            }
            _ => {}
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
