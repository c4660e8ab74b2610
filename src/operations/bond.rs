//! Liquid staking: bond native tokens, burn the staking token, or swap it

use super::{amount_receipt, attribute_amount};
use crate::error::{TxError, TxResult};
use crate::events::{AttributeSelector, Event};
use crate::pipeline::{FeeParams, TxOperation};
use crate::rendering::Receipt;
use crate::tx::{cw20_send, Coin, Msg};
use crate::units::{self, MICRO_DECIMALS};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

pub const NATIVE_DENOM: &str = "uluna";
pub const NATIVE_SYMBOL: &str = "LUNA";
pub const BOND_SYMBOL: &str = "aLUNA";

/// Validator the hub delegates newly bonded tokens to
pub const DEFAULT_VALIDATOR: &str = "terravaloper1zdpgj8am5nqqvht927k3etljyl6a52kwqndjz2";

/// Bond native tokens to the hub and mint the staking token
#[derive(Debug, Clone)]
pub struct Mint {
    pub wallet: String,
    pub hub: String,
    pub validator: String,
    /// Human amount of native tokens
    pub amount: String,
    /// Staking tokens minted per native token
    pub exchange_rate: Decimal,
    pub fee: Option<FeeParams>,
}

impl Mint {
    pub fn new(
        wallet: impl Into<String>,
        hub: impl Into<String>,
        amount: impl Into<String>,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            hub: hub.into(),
            validator: DEFAULT_VALIDATOR.to_string(),
            amount: amount.into(),
            exchange_rate,
            fee: None,
        }
    }

    pub fn with_fee(mut self, fee: FeeParams) -> Self {
        self.fee = Some(fee);
        self
    }
}

#[async_trait]
impl TxOperation for Mint {
    type Aux = ();

    fn name(&self) -> &'static str {
        "bond_mint"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let amount = units::microfy(&self.amount, MICRO_DECIMALS)?;

        Ok(vec![Msg::execute_with_funds(
            &self.wallet,
            &self.hub,
            json!({ "bond": { "validator": self.validator } }),
            vec![Coin::new(NATIVE_DENOM, amount)],
        )])
    }

    async fn fetch_aux(&self) -> TxResult<Option<()>> {
        Ok(Some(()))
    }

    fn interpret(&self, event: &Event, _aux: ()) -> TxResult<Vec<Receipt>> {
        let bonded = attribute_amount(
            event,
            AttributeSelector::KeyOrPosition("bonded", 3),
            MICRO_DECIMALS,
        )?;
        let minted = attribute_amount(
            event,
            AttributeSelector::KeyOrPosition("minted", 4),
            MICRO_DECIMALS,
        )?;

        let mut receipts = Vec::with_capacity(3);
        if let Some(bonded) = bonded {
            receipts.push(amount_receipt("Bonded Amount", bonded, MICRO_DECIMALS, NATIVE_SYMBOL));
        }
        if let Some(minted) = minted {
            receipts.push(amount_receipt("Minted Amount", minted, MICRO_DECIMALS, BOND_SYMBOL));
        }
        receipts.push(Receipt::text(
            "Exchange Rate",
            format!(
                "{} {} per {}",
                units::format_fluid(self.exchange_rate, 6),
                BOND_SYMBOL,
                NATIVE_SYMBOL
            ),
        ));
        Ok(receipts)
    }
}

/// Burn the staking token through the hub to start unbonding
#[derive(Debug, Clone)]
pub struct Burn {
    pub wallet: String,
    pub hub: String,
    pub token: String,
    /// Human amount of staking tokens
    pub amount: String,
    /// Native tokens redeemed per staking token
    pub exchange_rate: Decimal,
    pub fee: Option<FeeParams>,
}

impl Burn {
    pub fn new(
        wallet: impl Into<String>,
        hub: impl Into<String>,
        token: impl Into<String>,
        amount: impl Into<String>,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            hub: hub.into(),
            token: token.into(),
            amount: amount.into(),
            exchange_rate,
            fee: None,
        }
    }
}

#[async_trait]
impl TxOperation for Burn {
    type Aux = ();

    fn name(&self) -> &'static str {
        "bond_burn"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        let amount = units::microfy(&self.amount, MICRO_DECIMALS)?;

        Ok(vec![cw20_send(
            &self.wallet,
            &self.token,
            &self.hub,
            &amount,
            &json!({ "unbond": {} }),
        )])
    }

    async fn fetch_aux(&self) -> TxResult<Option<()>> {
        Ok(Some(()))
    }

    fn interpret(&self, event: &Event, _aux: ()) -> TxResult<Vec<Receipt>> {
        let mut receipts = Vec::with_capacity(2);

        if let Some(burned) =
            attribute_amount(event, AttributeSelector::Key("amount"), MICRO_DECIMALS)?
        {
            let expected = burned
                .checked_mul(self.exchange_rate)
                .ok_or_else(|| TxError::Parse(format!("redeem amount overflow: {}", burned)))?;

            receipts.push(amount_receipt("Burn Amount", burned, MICRO_DECIMALS, BOND_SYMBOL));
            receipts.push(amount_receipt(
                "Expected Redeem Amount",
                expected,
                MICRO_DECIMALS,
                NATIVE_SYMBOL,
            ));
        }
        Ok(receipts)
    }
}

/// Sell the staking token for native tokens on the pair contract
#[derive(Debug, Clone)]
pub struct Swap {
    pub wallet: String,
    pub pair: String,
    pub token: String,
    /// Human amount of staking tokens offered
    pub amount: String,
    /// Expected native tokens per staking token
    pub belief_price: Decimal,
    /// Accepted deviation from `belief_price`, as a ratio
    pub max_spread: Decimal,
    pub fee: Option<FeeParams>,
}

impl Swap {
    pub fn new(
        wallet: impl Into<String>,
        pair: impl Into<String>,
        token: impl Into<String>,
        amount: impl Into<String>,
        belief_price: Decimal,
        max_spread: Decimal,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            pair: pair.into(),
            token: token.into(),
            amount: amount.into(),
            belief_price,
            max_spread,
            fee: None,
        }
    }
}

#[async_trait]
impl TxOperation for Swap {
    type Aux = ();

    fn name(&self) -> &'static str {
        "bond_swap"
    }

    fn fee(&self) -> Option<&FeeParams> {
        self.fee.as_ref()
    }

    fn build_msgs(&self) -> TxResult<Vec<Msg>> {
        if self.belief_price <= Decimal::ZERO {
            return Err(TxError::Build(format!(
                "belief price must be positive, got {}",
                self.belief_price
            )));
        }
        let amount = units::microfy(&self.amount, MICRO_DECIMALS)?;

        Ok(vec![cw20_send(
            &self.wallet,
            &self.token,
            &self.pair,
            &amount,
            &json!({
                "swap": {
                    "belief_price": self.belief_price.normalize().to_string(),
                    "max_spread": self.max_spread.normalize().to_string(),
                }
            }),
        )])
    }

    async fn fetch_aux(&self) -> TxResult<Option<()>> {
        Ok(Some(()))
    }

    fn interpret(&self, event: &Event, _aux: ()) -> TxResult<Vec<Receipt>> {
        let pick = |key: &'static str| attribute_amount(event, AttributeSelector::Key(key), MICRO_DECIMALS);
        let offer = pick("offer_amount")?;
        let returned = pick("return_amount")?;
        let spread = pick("spread_amount")?;
        let commission = pick("commission_amount")?;

        let mut receipts = Vec::with_capacity(4);
        if let Some(offer) = offer {
            receipts.push(amount_receipt("Sold Amount", offer, MICRO_DECIMALS, BOND_SYMBOL));
        }
        if let Some(returned) = returned {
            receipts.push(amount_receipt("Received Amount", returned, MICRO_DECIMALS, NATIVE_SYMBOL));
        }
        if let (Some(spread), Some(commission)) = (spread, commission) {
            let trading_fee = spread
                .checked_add(commission)
                .ok_or_else(|| TxError::Parse(format!("trading fee overflow: {}", spread)))?;
            receipts.push(amount_receipt(
                "Trading Fee",
                trading_fee,
                MICRO_DECIMALS,
                NATIVE_SYMBOL,
            ));
        }
        if let (Some(offer), Some(returned)) = (offer, returned) {
            if !offer.is_zero() {
                let price = returned
                    .checked_div(offer)
                    .ok_or_else(|| TxError::Parse(format!("paid price overflow: {}", returned)))?;
                receipts.push(Receipt::text(
                    "Paid Price",
                    format!(
                        "{} {} per {}",
                        units::format_fluid(price, 6),
                        NATIVE_SYMBOL,
                        BOND_SYMBOL
                    ),
                ));
            }
        }
        Ok(receipts)
    }
}
