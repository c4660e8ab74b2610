//! Money-market snapshots and borrow-usage formulas
//!
//! All amounts are in base units. Oracle prices convert one base unit of a
//! collateral token into base units of the stable asset.

use crate::error::{TxError, TxResult};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Market-wide state needed to value collateral
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowMarket {
    /// Collateral token -> price in stable base units
    pub oracle_prices: HashMap<String, Decimal>,
    /// Collateral token -> maximum loan-to-value ratio
    pub max_ltvs: HashMap<String, Decimal>,
}

/// A borrower's position after the transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowBorrower {
    pub loan_amount: Decimal,
    /// (collateral token, locked balance)
    pub collaterals: Vec<(String, Decimal)>,
}

/// Both snapshots, fetched together
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowSnapshot {
    pub market: BorrowMarket,
    pub borrower: BorrowBorrower,
}

impl BorrowSnapshot {
    /// Borrow usage of the position, `None` when it has no borrow limit
    pub fn ltv(&self) -> TxResult<Option<Decimal>> {
        let limit = compute_borrow_limit(
            &self.borrower.collaterals,
            &self.market.oracle_prices,
            &self.market.max_ltvs,
        )?;
        Ok(compute_ltv(limit, compute_borrowed_amount(&self.borrower)))
    }
}

/// Queries for the auxiliary data of borrow operations.
///
/// `Ok(None)` means the data could not be loaded; `Err` means the query
/// itself was rejected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowQueries: Send + Sync {
    async fn market(&self) -> TxResult<Option<BorrowMarket>>;

    async fn borrower(&self) -> TxResult<Option<BorrowBorrower>>;
}

/// Fetch market and borrower concurrently; both must resolve
pub async fn fetch_snapshot(queries: &dyn BorrowQueries) -> TxResult<Option<BorrowSnapshot>> {
    let (market, borrower) = futures::future::try_join(queries.market(), queries.borrower())
        .await
        .map_err(|e| TxError::AuxiliaryQuery(e.to_string()))?;

    Ok(match (market, borrower) {
        (Some(market), Some(borrower)) => Some(BorrowSnapshot { market, borrower }),
        _ => None,
    })
}

/// Sum of collateral value times max LTV. Collaterals without a price or
/// LTV count as zero.
pub fn compute_borrow_limit(
    collaterals: &[(String, Decimal)],
    oracle_prices: &HashMap<String, Decimal>,
    max_ltvs: &HashMap<String, Decimal>,
) -> TxResult<Decimal> {
    collaterals
        .iter()
        .filter_map(|(token, balance)| {
            let price = oracle_prices.get(token)?;
            let ltv = max_ltvs.get(token)?;
            Some((token, balance.checked_mul(*price)?.checked_mul(*ltv)))
        })
        .try_fold(Decimal::ZERO, |limit, (token, value)| {
            value
                .and_then(|value| limit.checked_add(value))
                .ok_or_else(|| TxError::Parse(format!("borrow limit overflow at {}", token)))
        })
}

pub fn compute_borrowed_amount(borrower: &BorrowBorrower) -> Decimal {
    borrower.loan_amount
}

/// Borrowed amount over borrow limit; `None` for an empty limit or no loan
pub fn compute_ltv(borrow_limit: Decimal, borrowed_amount: Decimal) -> Option<Decimal> {
    if borrow_limit.is_zero() {
        return None;
    }
    let ltv = borrowed_amount.checked_div(borrow_limit)?;
    if ltv.is_zero() {
        None
    } else {
        Some(ltv)
    }
}
