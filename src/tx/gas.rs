//! Gas price acquisition: fee oracle, static prices and node pricing

use crate::chain::NodeClient;
use crate::config::{GasConfig, GasPriceStrategy};
use crate::error::{ClientError, ClientResult};
use crate::units;

use ethers::types::U256;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Wei per oracle unit: the oracle reports gwei × 10
const WEI_PER_ORACLE_UNIT: u64 = 100_000_000;
const ORACLE_UNIT_DECIMALS: usize = 8;

/// Fee schedule returned by the oracle; only the fastest tier is used
#[derive(Debug, Deserialize)]
struct FeeSchedule {
    fastest: serde_json::Number,
}

/// Client for an HTTP gas-price service
#[derive(Debug, Clone)]
pub struct GasOracle {
    url: String,
    client: reqwest::Client,
}

impl GasOracle {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("gas oracle client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Fetch the fastest tier and convert it to wei
    pub async fn current_gas_price(&self) -> ClientResult<U256> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ClientError::OracleUnavailable(e.to_string()))?;

        let schedule: FeeSchedule = response
            .json()
            .await
            .map_err(|e| ClientError::OracleUnavailable(format!("malformed fee schedule: {e}")))?;

        let price = fastest_to_wei(&schedule.fastest.to_string())?;
        debug!("Oracle fastest tier {} -> {} wei", schedule.fastest, price);
        Ok(price)
    }
}

/// Convert the oracle's `fastest` value (gwei × 10) into wei.
///
/// Works on the decimal text so no float rounding enters the result;
/// digits finer than one wei are truncated.
pub fn fastest_to_wei(fastest: &str) -> ClientResult<U256> {
    let malformed = || ClientError::OracleUnavailable(format!("malformed fastest value {fastest:?}"));

    let (whole, fraction) = fastest.split_once('.').unwrap_or((fastest, ""));
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let mut fraction: String = fraction.chars().take(ORACLE_UNIT_DECIMALS).collect();
    while fraction.len() < ORACLE_UNIT_DECIMALS {
        fraction.push('0');
    }

    let whole = U256::from_dec_str(whole).map_err(|_| malformed())?;
    let fraction = U256::from_dec_str(&fraction).map_err(|_| malformed())?;
    whole
        .checked_mul(U256::from(WEI_PER_ORACLE_UNIT))
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(malformed)
}

/// How a submission obtains its gas price
#[derive(Debug, Clone)]
pub enum GasPricing {
    /// Static price in wei
    Fixed(U256),
    /// Oracle price; `fallback` is used only when the oracle fails
    Oracle {
        oracle: GasOracle,
        fallback: Option<U256>,
    },
    /// The node's `eth_gasPrice`
    Node,
}

impl GasPricing {
    pub fn fixed_gwei(gwei: u64) -> Self {
        GasPricing::Fixed(units::gwei(gwei))
    }

    /// Build the pricing policy described by configuration
    pub fn from_config(config: &GasConfig) -> ClientResult<Self> {
        let fallback = config.fallback_gwei.map(units::gwei);
        match config.strategy {
            GasPriceStrategy::Fixed => fallback.map(GasPricing::Fixed).ok_or_else(|| {
                ClientError::Config("fixed gas pricing needs fallback_gwei".to_string())
            }),
            GasPriceStrategy::Oracle => {
                let url = config.oracle_url.clone().ok_or_else(|| {
                    ClientError::Config("oracle gas pricing needs oracle_url".to_string())
                })?;
                let oracle = GasOracle::new(url, Duration::from_millis(config.oracle_timeout_ms))?;
                Ok(GasPricing::Oracle { oracle, fallback })
            }
            GasPriceStrategy::Node => Ok(GasPricing::Node),
        }
    }

    /// Resolve the price for one submission
    pub async fn resolve(&self, node: &dyn NodeClient) -> ClientResult<U256> {
        match self {
            GasPricing::Fixed(price) => Ok(*price),
            GasPricing::Oracle { oracle, fallback } => match oracle.current_gas_price().await {
                Ok(price) => Ok(price),
                Err(e) => match fallback {
                    Some(price) => {
                        warn!("{}; using fallback gas price {} wei", e, price);
                        crate::metrics::record_gas_price_fallback();
                        Ok(*price)
                    }
                    None => Err(e),
                },
            },
            GasPricing::Node => node
                .gas_price()
                .await
                .map_err(|e| ClientError::rpc("gas_price", e)),
        }
    }
}
