//! Per-run transaction context
//!
//! `TxContext` is threaded by value through the pipeline: each stage takes
//! the context it was given and returns an updated one. It carries the built
//! request, the broadcast result once available, and renders the hash and
//! fee receipts every terminal result ends with.

use super::request::TransactionRequest;
use super::sender::BroadcastResult;
use crate::config::Settings;
use crate::error::{TxError, TxResult};
use crate::rendering::{Receipt, TxResultRendering};
use crate::units;

use std::sync::Arc;
use uuid::Uuid;

/// Immutable pipeline context for a single operation run
#[derive(Debug, Clone)]
pub struct TxContext {
    run_id: Uuid,
    settings: Arc<Settings>,
    /// Fee shown on receipts, in native base units
    tx_fee: String,
    request: Option<Arc<TransactionRequest>>,
    broadcast: Option<BroadcastResult>,
}

impl TxContext {
    /// Fresh context; one per user-initiated operation
    pub fn new(settings: Arc<Settings>, tx_fee: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            settings,
            tx_fee: tx_fee.into(),
            request: None,
            broadcast: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Store the built request
    pub fn save_tx(self, request: TransactionRequest) -> Self {
        Self {
            request: Some(Arc::new(request)),
            ..self
        }
    }

    /// The built request; fails if nothing was saved yet
    pub fn saved_tx(&self) -> TxResult<&TransactionRequest> {
        self.request
            .as_deref()
            .ok_or_else(|| TxError::IllegalState("Saved Tx not found".to_string()))
    }

    /// Store the broadcast result; requires a saved request
    pub fn save_tx_result(self, result: BroadcastResult) -> TxResult<Self> {
        self.saved_tx()?;
        Ok(Self {
            broadcast: Some(result),
            ..self
        })
    }

    /// The broadcast result; fails before a successful post
    pub fn saved_tx_result(&self) -> TxResult<&BroadcastResult> {
        self.broadcast
            .as_ref()
            .ok_or_else(|| TxError::IllegalState("Saved TxResult not found".to_string()))
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.broadcast.as_ref().map(|b| b.tx_hash.as_str())
    }

    /// Explorer link to the broadcast transaction, `None` before broadcast
    pub fn tx_hash_receipt(&self) -> Option<Receipt> {
        let result = self.broadcast.as_ref()?;
        let pipeline = &self.settings.pipeline;

        let url = self.settings.chain.tx_url(&result.tx_hash);
        let html = format!(
            r#"<a href="{}" target="_blank" rel="noreferrer">{}</a>"#,
            url,
            truncate(&result.tx_hash, pipeline.hash_head, pipeline.hash_tail)
        );

        Some(Receipt::html("Tx Hash", html))
    }

    /// Fee receipt in the chain's native unit; `fee_override` is in base units
    pub fn tx_fee_receipt(&self, fee_override: Option<&str>) -> Receipt {
        let chain = &self.settings.chain;
        let fee = fee_override.unwrap_or(&self.tx_fee);

        let amount = units::demicrofy(fee, chain.native_decimals)
            .map(|v| units::format_output(v, chain.native_decimals))
            .unwrap_or_else(|_| fee.to_string());

        Receipt::amount("Tx Fee", amount, chain.native_symbol.clone())
    }

    /// Hash and fee receipts, in that order
    pub fn closing_receipts(&self) -> Vec<Receipt> {
        self.tx_hash_receipt()
            .into_iter()
            .chain(std::iter::once(self.tx_fee_receipt(None)))
            .collect()
    }

    /// Receipts available when the run fails
    pub fn partial_receipts(&self) -> Vec<Receipt> {
        self.tx_hash_receipt().into_iter().collect()
    }

    /// Successful transaction whose result could not be summarized
    pub fn failed_to_create_receipt(&self, error: TxError) -> TxResultRendering {
        TxResultRendering::degraded(self.closing_receipts(), error)
    }

    pub fn failed_to_find_raw_log(&self, index: usize) -> TxResultRendering {
        self.failed_to_create_receipt(TxError::RawLogNotFound { index })
    }

    pub fn failed_to_find_events(&self, names: &[&str]) -> TxResultRendering {
        self.failed_to_create_receipt(TxError::EventsNotFound {
            names: names.iter().map(|n| n.to_string()).collect(),
        })
    }

    pub fn failed_to_parse_tx_result(&self, detail: impl Into<String>) -> TxResultRendering {
        self.failed_to_create_receipt(TxError::Parse(detail.into()))
    }
}

/// Shorten `text` to `head...tail` when longer than both parts together
pub fn truncate(text: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= head + tail {
        return text.to_string();
    }

    let head: String = chars[..head].iter().collect();
    let tail: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", head, tail)
}
