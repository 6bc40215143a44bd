//! Ether amount parsing and display

use crate::{Error, Result};
use alloy::primitives::utils::parse_ether;
use alloy::primitives::U256;

/// Decimal places shown for ether amounts
pub const DISPLAY_PLACES: u32 = 4;

const ETH_DECIMALS: u32 = 18;

/// Parse a decimal ether string ("0.05") into wei
pub fn parse_eth(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidAmount("amount is empty".to_string()));
    }
    parse_ether(trimmed).map_err(|e| Error::InvalidAmount(format!("{}: {}", trimmed, e)))
}

/// Format wei as ether with [`DISPLAY_PLACES`] decimals, rounding half up
pub fn format_eth(value: U256) -> String {
    let ten = U256::from(10);
    let step = ten.pow(U256::from(ETH_DECIMALS - DISPLAY_PLACES));
    let rounded = value.saturating_add(step / U256::from(2)) / step;

    let scale = ten.pow(U256::from(DISPLAY_PLACES));
    let whole = rounded / scale;
    let fraction = (rounded % scale).to_string();
    format!(
        "{}.{:0>width$}",
        whole,
        fraction,
        width = DISPLAY_PLACES as usize
    )
}
