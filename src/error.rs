//! Error types for the transaction pipeline

use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Build,
    Broadcast,
    Poll,
    Auxiliary,
    Interpretation,
}

impl ErrorStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorStage::Build => "build",
            ErrorStage::Broadcast => "broadcast",
            ErrorStage::Poll => "poll",
            ErrorStage::Auxiliary => "auxiliary",
            ErrorStage::Interpretation => "interpretation",
        }
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TxError {
    #[error("Invalid transaction parameters: {0}")]
    Build(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("User denied the transaction")]
    UserDenied,

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Transaction {tx_hash} failed on chain with code {code}: {raw_log}")]
    Execution {
        tx_hash: String,
        code: u32,
        raw_log: String,
    },

    #[error(
        "Transaction {tx_hash} was not found after {attempts} attempts; it may still be included later"
    )]
    Timeout { tx_hash: String, attempts: u32 },

    #[error("Chain query error: {0}")]
    Query(String),

    #[error("Auxiliary query failed: {0}")]
    AuxiliaryQuery(String),

    #[error("Undefined RawLog")]
    RawLogNotFound { index: usize },

    #[error("Undefined events \"{}\"", names.join(", "))]
    EventsNotFound { names: Vec<String> },

    #[error("Undefined attribute {selector} in event {event}")]
    AttributeNotFound { event: String, selector: String },

    #[error("Failed to parse TxResult: {0}")]
    Parse(String),

    #[error("Failed to load {0}")]
    AuxiliaryUnavailable(String),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl TxError {
    /// Stage this error belongs to
    pub fn stage(&self) -> ErrorStage {
        match self {
            TxError::Build(_) | TxError::IllegalState(_) => ErrorStage::Build,
            TxError::UserDenied
            | TxError::Wallet(_)
            | TxError::Broadcast(_)
            | TxError::Execution { .. } => ErrorStage::Broadcast,
            TxError::Timeout { .. } | TxError::Query(_) | TxError::Cancelled => ErrorStage::Poll,
            TxError::AuxiliaryQuery(_) => ErrorStage::Auxiliary,
            TxError::RawLogNotFound { .. }
            | TxError::EventsNotFound { .. }
            | TxError::AttributeNotFound { .. }
            | TxError::Parse(_)
            | TxError::AuxiliaryUnavailable(_) => ErrorStage::Interpretation,
        }
    }

    /// Whether the error ends the pipeline in the FAIL phase.
    ///
    /// Interpretation errors are recovered into a degraded SUCCEED because
    /// the on-chain effect already happened.
    pub fn is_fatal(&self) -> bool {
        self.stage() != ErrorStage::Interpretation
    }

    /// Transaction hash known at the time of failure, if any
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            TxError::Timeout { tx_hash, .. } | TxError::Execution { tx_hash, .. } => {
                Some(tx_hash)
            }
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type TxResult<T> = Result<T, TxError>;
