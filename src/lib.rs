//! Money-market transaction pipeline
//!
//! Builds contract-call transactions for mint, burn, swap, borrow, repay
//! and collateral operations, submits them through an injected wallet,
//! polls the chain for the finalized record and turns its events into
//! display receipts. Every outcome converges on a
//! [`TxResultRendering`](rendering::TxResultRendering).

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod operations;
pub mod pipeline;
pub mod rendering;
pub mod telemetry;
pub mod tx;
pub mod units;

pub use config::Settings;
pub use error::{ErrorStage, TxError, TxResult};
pub use events::{AttributeSelector, FinalizedRecord};
pub use pipeline::{CancelHandle, Emitter, FeeParams, OnSucceed, TxOperation, TxPipeline, TxStream};
pub use rendering::{Receipt, ReceiptValue, TxResultRendering, TxStreamPhase};
pub use tx::{BroadcastResult, Broadcaster, TransactionRequest, TxQuery};
