//! Renderable pipeline results
//!
//! Every stage and every consumer observes the same shape:
//! [`TxResultRendering`], carrying a phase, the receipts assembled so far,
//! and any errors.

use crate::error::TxError;

use serde::Serialize;
use std::fmt;

/// Phase of a pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStreamPhase {
    /// Building and signing the request
    Post,
    /// Broadcast accepted, waiting for inclusion
    Broadcast,
    /// Record found, interpreting the result
    Interpret,
    Succeed,
    Fail,
}

impl TxStreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStreamPhase::Succeed | TxStreamPhase::Fail)
    }
}

/// Value shown for a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptValue {
    Text { text: String },
    Amount { amount: String, symbol: String },
    Html { html: String },
}

impl fmt::Display for ReceiptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptValue::Text { text } => f.write_str(text),
            ReceiptValue::Amount { amount, symbol } => write!(f, "{} {}", amount, symbol),
            ReceiptValue::Html { html } => f.write_str(html),
        }
    }
}

/// Display-ready (label, value) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub name: String,
    pub value: ReceiptValue,
}

impl Receipt {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ReceiptValue::Text { text: text.into() },
        }
    }

    pub fn amount(name: impl Into<String>, amount: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ReceiptValue::Amount {
                amount: amount.into(),
                symbol: symbol.into(),
            },
        }
    }

    pub fn html(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ReceiptValue::Html { html: html.into() },
        }
    }
}

/// Error attached to a receipt list, rendered with a user-facing message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptError {
    #[serde(skip)]
    pub error: TxError,
    pub message: String,
}

impl ReceiptError {
    pub fn new(error: TxError) -> Self {
        let message = error.to_string();
        Self { error, message }
    }
}

/// Result of a pipeline execution as seen by the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxResultRendering {
    pub phase: TxStreamPhase,
    pub receipts: Vec<Receipt>,
    /// Interpretation problems on an otherwise successful transaction
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub receipt_errors: Vec<ReceiptError>,
    /// Fatal failure, present only in the FAIL phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReceiptError>,
}

impl TxResultRendering {
    pub fn in_progress(phase: TxStreamPhase, receipts: Vec<Receipt>) -> Self {
        Self {
            phase,
            receipts,
            receipt_errors: Vec::new(),
            failure: None,
        }
    }

    pub fn succeed(receipts: Vec<Receipt>) -> Self {
        Self {
            phase: TxStreamPhase::Succeed,
            receipts,
            receipt_errors: Vec::new(),
            failure: None,
        }
    }

    /// Successful transaction whose summary could not be produced
    pub fn degraded(receipts: Vec<Receipt>, error: TxError) -> Self {
        Self {
            phase: TxStreamPhase::Succeed,
            receipts,
            receipt_errors: vec![ReceiptError::new(error)],
            failure: None,
        }
    }

    pub fn fail(error: TxError, message: String, partial_receipts: Vec<Receipt>) -> Self {
        Self {
            phase: TxStreamPhase::Fail,
            receipts: partial_receipts,
            receipt_errors: Vec::new(),
            failure: Some(ReceiptError { error, message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn receipt(&self, name: &str) -> Option<&Receipt> {
        self.receipts.iter().find(|r| r.name == name)
    }
}
