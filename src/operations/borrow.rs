//! Money-market borrowing and collateral management
//!
//! Every operation here reports the borrow usage of the position after the
//! transaction, so all of them fetch a [`BorrowSnapshot`] as auxiliary data.

use super::market::{fetch_snapshot, BorrowQueries, BorrowSnapshot};
use super::{amount_receipt, attribute_amount, usage_receipt};
use crate::error::{TxError, TxResult};
use crate::events::{AttributeSelector, Event};
use crate::pipeline::{FeeParams, TxOperation};
use crate::rendering::Receipt;
use crate::tx::{cw20_send, Coin, Msg};
use crate::units::{self, MICRO_DECIMALS};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;

pub const STABLE_DENOM: &str = "uusd";
pub const STABLE_SYMBOL: &str = "UST";

/// Whitelisted collateral token and the custody contract holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collateral {
    pub token: String,
    pub custody: String,
    pub symbol: String,
    pub decimals: u32,
}

/// Collateral that wraps another token at an exchange rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCollateral {
    /// The wrapper token, deposited as collateral
    pub collateral: Collateral,
    pub underlying_token: String,
    pub underlying_symbol: String,
}

/// Accounts and queries shared by every borrow operation
#[derive(Clone)]
pub struct BorrowAccount {
    pub wallet: String,
    pub market: String,
    pub overseer: String,
    pub queries: Arc<dyn BorrowQueries>,
}

impl BorrowAccount {
    pub fn new(
        wallet: impl Into<String>,
        market: impl Into<String>,
        overseer: impl Into<String>,
        queries: Arc<dyn BorrowQueries>,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            market: market.into(),
            overseer: overseer.into(),
            queries,
        }
    }

    fn lock(&self, token: &str, amount: &str) -> Msg {
        Msg::execute(
            &self.wallet,
            &self.overseer,
            json!({ "lock_collateral": { "collaterals": [[token, amount]] } }),
        )
    }

    fn unlock(&self, token: &str, amount: &str) -> Msg {
        Msg::execute(
            &self.wallet,
            &self.overseer,
            json!({ "unlock_collateral": { "collaterals": [[token, amount]] } }),
        )
    }
}

fn stable_receipt(event: &Event, key: &'static str, name: &str) -> TxResult<Option<Receipt>> {
    Ok(attribute_amount(event, AttributeSelector::Key(key), MICRO_DECIMALS)?
        .map(|amount| amount_receipt(name, amount, MICRO_DECIMALS, STABLE_SYMBOL)))
}

fn collateral_amount(event: &Event, collateral: &Collateral) -> TxResult<Option<Decimal>> {
    attribute_amount(event, AttributeSelector::Key("amount"), collateral.decimals)
}

fn with_usage(mut receipts: Vec<Receipt>, snapshot: &BorrowSnapshot) -> TxResult<Vec<Receipt>> {
    if let Some(ltv) = snapshot.ltv()? {
        receipts.push(usage_receipt(ltv)?);
    }
    Ok(receipts)
}

/// Borrow stable tokens against locked collateral
#[derive(Clone)]
pub struct Borrow {
    pub account: BorrowAccount,
    /// Human amount of stable tokens
    pub amount: String,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for Borrow {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_borrow"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let amount = units::microfy(&self.amount, MICRO_DECIMALS)?;

        Ok(vec![Msg::execute(
            &self.account.wallet,
            &self.account.market,
            json!({ "borrow_stable": { "borrow_amount": amount } }),
        )])
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let receipts = stable_receipt(event, "borrow_amount", "Borrowed Amount")?
            .into_iter()
            .collect();
        with_usage(receipts, &snapshot)
    }
}

/// Repay the stable loan with native funds
#[derive(Clone)]
pub struct Repay {
    pub account: BorrowAccount,
    /// Human amount of stable tokens
    pub amount: String,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for Repay {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_repay"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let amount = units::microfy(&self.amount, MICRO_DECIMALS)?;

        Ok(vec![Msg::execute_with_funds(
            &self.account.wallet,
            &self.account.market,
            json!({ "repay_stable": {} }),
            vec![Coin::new(STABLE_DENOM, amount)],
        )])
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let receipts = stable_receipt(event, "repay_amount", "Repaid Amount")?
            .into_iter()
            .collect();
        with_usage(receipts, &snapshot)
    }
}

/// Deposit collateral into custody and lock it in the overseer
#[derive(Clone)]
pub struct ProvideCollateral {
    pub account: BorrowAccount,
    pub collateral: Collateral,
    /// Human amount of collateral tokens
    pub amount: String,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for ProvideCollateral {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_provide_collateral"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let collateral = &self.collateral;
        let amount = units::microfy(&self.amount, collateral.decimals)?;

        Ok(vec![
            cw20_send(
                &self.account.wallet,
                &collateral.token,
                &collateral.custody,
                &amount,
                &json!({ "deposit_collateral": {} }),
            ),
            self.account.lock(&collateral.token, &amount),
        ])
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let collateral = &self.collateral;
        let receipts = collateral_amount(event, collateral)?
            .map(|amount| {
                amount_receipt("Deposited Amount", amount, collateral.decimals, &collateral.symbol)
            })
            .into_iter()
            .collect();
        with_usage(receipts, &snapshot)
    }
}

/// Unlock collateral from the overseer and withdraw it from custody
#[derive(Clone)]
pub struct RedeemCollateral {
    pub account: BorrowAccount,
    pub collateral: Collateral,
    /// Human amount of collateral tokens
    pub amount: String,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for RedeemCollateral {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_redeem_collateral"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let collateral = &self.collateral;
        let amount = units::microfy(&self.amount, collateral.decimals)?;

        Ok(vec![
            self.account.unlock(&collateral.token, &amount),
            withdraw(&self.account.wallet, collateral, &amount),
        ])
    }

    /// The withdraw message reports the redeemed amount
    fn raw_log_index(&self) -> usize {
        1
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let collateral = &self.collateral;
        let receipts = collateral_amount(event, collateral)?
            .map(|amount| {
                amount_receipt("Redeemed Amount", amount, collateral.decimals, &collateral.symbol)
            })
            .into_iter()
            .collect();
        with_usage(receipts, &snapshot)
    }
}

/// Wrap the underlying token, deposit the wrapper and lock it
#[derive(Clone)]
pub struct ProvideWrappedCollateral {
    pub account: BorrowAccount,
    pub wrapped: WrappedCollateral,
    /// Human amount of wrapper tokens to deposit
    pub amount: String,
    /// Human amount of underlying tokens to wrap
    pub underlying_amount: String,
    /// Underlying tokens per wrapper token
    pub exchange_rate: Decimal,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for ProvideWrappedCollateral {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_provide_wrapped_collateral"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let collateral = &self.wrapped.collateral;
        let wallet = &self.account.wallet;
        let amount = units::microfy(&self.amount, collateral.decimals)?;
        let underlying = units::microfy(&self.underlying_amount, collateral.decimals)?;

        Ok(vec![
            Msg::execute(
                wallet,
                &self.wrapped.underlying_token,
                json!({
                    "increase_allowance": {
                        "spender": collateral.token,
                        "amount": underlying,
                    }
                }),
            ),
            Msg::execute(
                wallet,
                &collateral.token,
                json!({ "mint_with": { "recipient": wallet, "lsd_amount": underlying } }),
            ),
            cw20_send(
                wallet,
                &collateral.token,
                &collateral.custody,
                &amount,
                &json!({ "deposit_collateral": {} }),
            ),
            self.account.lock(&collateral.token, &amount),
        ])
    }

    /// The custody deposit reports the wrapped amount
    fn raw_log_index(&self) -> usize {
        2
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let collateral = &self.wrapped.collateral;
        let mut receipts = Vec::with_capacity(3);

        if let Some(deposited) = collateral_amount(event, collateral)? {
            let wrapped_from = deposited
                .checked_mul(self.exchange_rate)
                .ok_or_else(|| TxError::Parse(format!("wrapped amount overflow: {}", deposited)))?;

            receipts.push(amount_receipt(
                "Deposited Amount",
                deposited,
                collateral.decimals,
                &collateral.symbol,
            ));
            receipts.push(amount_receipt(
                "Wrapped From",
                wrapped_from,
                collateral.decimals,
                &self.wrapped.underlying_symbol,
            ));
        }
        with_usage(receipts, &snapshot)
    }
}

/// Unlock and withdraw the wrapper, then burn it for the underlying token
#[derive(Clone)]
pub struct RedeemWrappedCollateral {
    pub account: BorrowAccount,
    pub wrapped: WrappedCollateral,
    /// Human amount of wrapper tokens
    pub amount: String,
    /// Underlying tokens per wrapper token
    pub exchange_rate: Decimal,
    pub fee: Option<FeeParams>,
}

#[async_trait]
impl TxOperation for RedeemWrappedCollateral {
    type Aux = BorrowSnapshot;

    fn aux_label(&self) -> &'static str {
        "borrow"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    async fn fetch_aux(&self) -> TxResult<Option<BorrowSnapshot>> {
        fetch_snapshot(self.account.queries.as_ref()).await
    }

    fn name(&self) -> &'static str {
        "borrow_redeem_wrapped_collateral"
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let collateral = &self.wrapped.collateral;
        let amount = units::microfy(&self.amount, collateral.decimals)?;

        Ok(vec![
            self.account.unlock(&collateral.token, &amount),
            withdraw(&self.account.wallet, collateral, &amount),
            Msg::execute(
                &self.account.wallet,
                &collateral.token,
                json!({ "burn": { "amount": amount } }),
            ),
        ])
    }

    fn raw_log_index(&self) -> usize {
        1
    }

    fn interpret(&self, event: &Event, snapshot: BorrowSnapshot) -> TxResult<Vec<Receipt>> {
        let collateral = &self.wrapped.collateral;
        let mut receipts = Vec::with_capacity(3);

        if let Some(redeemed) = collateral_amount(event, collateral)? {
            let withdrawn = redeemed.checked_div(self.exchange_rate).ok_or_else(|| {
                TxError::Parse(format!(
                    "cannot unwrap {} at exchange rate {}",
                    redeemed, self.exchange_rate
                ))
            })?;

            receipts.push(amount_receipt(
                "Redeemed Amount",
                redeemed,
                collateral.decimals,
                &collateral.symbol,
            ));
            receipts.push(amount_receipt(
                "Withdrawn Amount",
                withdrawn,
                collateral.decimals,
                &self.wrapped.underlying_symbol,
            ));
        }
        with_usage(receipts, &snapshot)
    }
}

fn withdraw(wallet: &str, collateral: &Collateral, amount: &str) -> Msg {
    let execute_msg: Value = json!({ "withdraw_collateral": { "amount": amount } });
    Msg::execute(wallet, &collateral.custody, execute_msg)
}
