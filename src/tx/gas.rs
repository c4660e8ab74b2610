//! Fee and gas parameters for a transaction

use super::request::{Coin, Fee};
use crate::config::GasConfig;
use crate::error::TxResult;
use crate::units;

use rust_decimal::Decimal;
use tracing::debug;

/// Builds fees from an estimated gas amount and a fixed fee
#[derive(Debug, Clone)]
pub struct FeeBuilder {
    denom: String,
    gas_adjustment: Decimal,
    default_gas_wanted: u64,
}

impl FeeBuilder {
    pub fn new(config: &GasConfig, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            gas_adjustment: config.gas_adjustment,
            default_gas_wanted: config.gas_wanted,
        }
    }

    pub fn gas_adjustment(&self) -> Decimal {
        self.gas_adjustment
    }

    /// Fee for `gas_wanted` gas (or the configured default) paying
    /// `fixed_fee` base units, floored to an integer amount
    pub fn fee(&self, gas_wanted: Option<u64>, fixed_fee: &str) -> TxResult<Fee> {
        let gas_limit = gas_wanted.unwrap_or(self.default_gas_wanted);
        let amount = units::floor_units(fixed_fee)?;

        debug!("Fee: gas {} amount {}{}", gas_limit, amount, self.denom);

        Ok(Fee {
            gas_limit,
            amount: vec![Coin::new(self.denom.clone(), amount)],
        })
    }
}
