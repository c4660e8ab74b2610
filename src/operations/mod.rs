//! Financial operations expressed as [`TxOperation`](crate::pipeline::TxOperation)s
//!
//! - `bond`: mint, burn and swap of the liquid staking token
//! - `borrow`: borrow, repay and collateral management on the money market

pub mod bond;
pub mod borrow;
pub mod market;

pub use bond::{Burn, Mint, Swap};
pub use borrow::{
    Borrow, BorrowAccount, Collateral, ProvideCollateral, ProvideWrappedCollateral, RedeemCollateral,
    RedeemWrappedCollateral, Repay, WrappedCollateral,
};
pub use market::{BorrowBorrower, BorrowMarket, BorrowQueries, BorrowSnapshot};

use crate::error::TxResult;
use crate::events::{self, AttributeSelector, Event};
use crate::rendering::Receipt;
use crate::units;

use rust_decimal::Decimal;

/// Human amount of an attribute holding base units; `None` if absent
pub(crate) fn attribute_amount(
    event: &Event,
    selector: AttributeSelector,
    decimals: u32,
) -> TxResult<Option<Decimal>> {
    events::pick_attribute(event, selector)
        .map(|value| units::demicrofy(value, decimals))
        .transpose()
}

/// Amount receipt displayed with the token's precision
pub(crate) fn amount_receipt(name: &str, amount: Decimal, decimals: u32, symbol: &str) -> Receipt {
    Receipt::amount(name, units::format_output(amount, decimals), symbol)
}

/// Borrow usage after the transaction, as a percentage
pub(crate) fn usage_receipt(ltv: Decimal) -> TxResult<Receipt> {
    Ok(Receipt::text("New Borrow Usage", format!("{} %", units::format_rate(ltv)?)))
}
