//! Conversions between display amounts and smallest-unit integers

use crate::error::{ClientError, ClientResult};

use ethers::types::U256;
use ethers::utils::{format_units, parse_units};

pub const GWEI: u64 = 1_000_000_000;

/// Parse a decimal string such as `"0.02"` into smallest units
pub fn to_base_units(amount: &str, decimals: u32) -> ClientResult<U256> {
    let amount = amount.trim();
    if amount.starts_with('-') {
        return Err(ClientError::Units(format!("negative amount {amount}")));
    }
    parse_units(amount, decimals)
        .map(Into::into)
        .map_err(|e| ClientError::Units(format!("{amount}: {e}")))
}

/// Render smallest units as a decimal string for display
pub fn to_display(amount: U256, decimals: u32) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

pub fn gwei(value: u64) -> U256 {
    U256::from(value) * U256::from(GWEI)
}
