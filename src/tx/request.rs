//! Chain-agnostic transaction request model

use crate::error::{TxError, TxResult};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Token amount in base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

/// Fee attached to a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub amount: Vec<Coin>,
}

/// Contract-call message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    ExecuteContract {
        sender: String,
        contract: String,
        execute_msg: Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        funds: Vec<Coin>,
    },
}

impl Msg {
    /// Contract call without attached funds
    pub fn execute(sender: &str, contract: &str, execute_msg: Value) -> Self {
        Msg::ExecuteContract {
            sender: sender.to_string(),
            contract: contract.to_string(),
            execute_msg,
            funds: Vec::new(),
        }
    }

    /// Contract call sending native funds along
    pub fn execute_with_funds(
        sender: &str,
        contract: &str,
        execute_msg: Value,
        funds: Vec<Coin>,
    ) -> Self {
        Msg::ExecuteContract {
            sender: sender.to_string(),
            contract: contract.to_string(),
            execute_msg,
            funds,
        }
    }

    pub fn contract(&self) -> &str {
        match self {
            Msg::ExecuteContract { contract, .. } => contract,
        }
    }

    pub fn execute_msg(&self) -> &Value {
        match self {
            Msg::ExecuteContract { execute_msg, .. } => execute_msg,
        }
    }
}

/// cw20 `send` of `amount` tokens to `recipient`, carrying a base64 hook
pub fn cw20_send(sender: &str, token: &str, recipient: &str, amount: &str, hook: &Value) -> Msg {
    let encoded = BASE64_STANDARD.encode(hook.to_string());
    Msg::execute(
        sender,
        token,
        json!({
            "send": {
                "contract": recipient,
                "amount": amount,
                "msg": encoded,
            }
        }),
    )
}

/// Immutable transaction request handed to the broadcaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub msgs: Vec<Msg>,
    pub fee: Fee,
    pub gas_adjustment: Decimal,
}

impl TransactionRequest {
    /// Create a new request; at least one message is required
    pub fn new(msgs: Vec<Msg>, fee: Fee, gas_adjustment: Decimal) -> TxResult<Self> {
        if msgs.is_empty() {
            return Err(TxError::Build("transaction has no messages".to_string()));
        }
        if gas_adjustment <= Decimal::ZERO {
            return Err(TxError::Build(format!(
                "gas adjustment must be positive, got {}",
                gas_adjustment
            )));
        }

        Ok(Self {
            msgs,
            fee,
            gas_adjustment,
        })
    }
}
