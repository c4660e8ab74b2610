//! The parameterization of one financial action

use crate::error::TxResult;
use crate::events::Event;
use crate::rendering::Receipt;
use crate::tx::Msg;

use async_trait::async_trait;

/// Gas and fee for a single submission, from the caller's fee estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeParams {
    pub gas_wanted: u64,
    /// Fixed fee in native base units
    pub tx_fee: String,
}

impl FeeParams {
    pub fn new(gas_wanted: u64, tx_fee: impl Into<String>) -> Self {
        Self {
            gas_wanted,
            tx_fee: tx_fee.into(),
        }
    }
}

/// A financial action expressed as data for the generic pipeline.
///
/// `raw_log_index` must agree with the position of the message in
/// `build_msgs` whose log carries `event_name`.
#[async_trait]
pub trait TxOperation: Send + Sync {
    /// Data fetched from outside the transaction to compute derived metrics
    type Aux: Send;

    /// Label for logs and metrics
    fn name(&self) -> &'static str;

    /// Caller-supplied fee; `None` uses the configured defaults
    fn fee(&self) -> Option<&FeeParams> {
        None
    }

    /// Contract calls, in execution order. Must not touch the network.
    fn build_msgs(&self) -> TxResult<Vec<Msg>>;

    fn raw_log_index(&self) -> usize {
        0
    }

    fn event_name(&self) -> &'static str {
        "from_contract"
    }

    /// Label used when auxiliary data is unavailable
    fn aux_label(&self) -> &'static str {
        self.name()
    }

    /// Fetch auxiliary data, at most once per run. `Ok(None)` means the
    /// data is unavailable; `Err` fails the whole run.
    async fn fetch_aux(&self) -> TxResult<Option<Self::Aux>>;

    /// Operation receipts, without the closing hash and fee receipts
    fn interpret(&self, event: &Event, aux: Self::Aux) -> TxResult<Vec<Receipt>>;
}
