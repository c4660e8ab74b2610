//! Poll stage: wait for the broadcast transaction to be finalized
//!
//! The poller queries the chain at a fixed interval until the record is
//! found, the attempt budget runs out, or the run is cancelled.

use super::helper::TxContext;
use crate::config::PipelineConfig;
use crate::error::{TxError, TxResult};
use crate::events::FinalizedRecord;
use crate::pipeline::{CancelToken, Emitter};
use crate::rendering::{TxResultRendering, TxStreamPhase};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chain lookup of finalized transactions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxQuery: Send + Sync {
    /// `Ok(None)` while the transaction is not yet included
    async fn query_tx_by_hash(&self, tx_hash: &str) -> TxResult<Option<FinalizedRecord>>;
}

/// Polls a [`TxQuery`] for a finalized record
pub struct TxPoller<Q: ?Sized> {
    query: Arc<Q>,
    interval: Duration,
    max_attempts: u32,
}

impl<Q: TxQuery + ?Sized> TxPoller<Q> {
    pub fn new(query: Arc<Q>, config: &PipelineConfig) -> Self {
        Self {
            query,
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts.max(1),
        }
    }

    /// Poll until found, timed out or cancelled.
    ///
    /// A record with a non-zero code is an execution failure. Query errors
    /// are treated as transient and count against the attempt budget.
    pub async fn poll(
        &self,
        ctx: &TxContext,
        emitter: &Emitter,
        cancel: &CancelToken,
    ) -> TxResult<FinalizedRecord> {
        let tx_hash = ctx.saved_tx_result()?.tx_hash.clone();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                info!("Polling for {} cancelled before attempt {}", tx_hash, attempt);
                return Err(TxError::Cancelled);
            }

            crate::metrics::record_poll_attempt();

            match self.query.query_tx_by_hash(&tx_hash).await {
                Ok(Some(record)) if record.is_success() => {
                    info!(
                        "Transaction {} finalized at height {} (attempt {}/{})",
                        tx_hash, record.height, attempt, self.max_attempts
                    );
                    return Ok(record);
                }
                Ok(Some(record)) => {
                    warn!(
                        "Transaction {} failed on chain with code {}",
                        tx_hash, record.code
                    );
                    return Err(TxError::Execution {
                        tx_hash,
                        code: record.code,
                        raw_log: record.raw_log,
                    });
                }
                Ok(None) => {
                    debug!(
                        "Transaction {} not found yet ({}/{})",
                        tx_hash, attempt, self.max_attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "Query for {} failed ({}/{}): {}",
                        tx_hash, attempt, self.max_attempts, e
                    );
                }
            }

            emitter
                .emit(TxResultRendering::in_progress(
                    TxStreamPhase::Broadcast,
                    ctx.partial_receipts(),
                ))
                .await;

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancel.cancelled() => {
                        info!("Polling for {} cancelled", tx_hash);
                        return Err(TxError::Cancelled);
                    }
                }
            }
        }

        Err(TxError::Timeout {
            tx_hash,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::tx::request::{Coin, Fee, Msg, TransactionRequest};
    use crate::tx::sender::BroadcastResult;
    use mockall::Sequence;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn context() -> TxContext {
        let request = TransactionRequest::new(
            vec![Msg::execute("terra1user", "terra1market", json!({"repay_stable": {}}))],
            Fee {
                gas_limit: 1,
                amount: vec![Coin::new("uluna", "1")],
            },
            Decimal::ONE,
        )
        .unwrap();
        TxContext::new(Arc::new(Settings::default()), "1")
            .save_tx(request)
            .save_tx_result(BroadcastResult {
                tx_hash: "AB12".to_string(),
                network: "phoenix-1".to_string(),
            })
            .unwrap()
    }

    fn config(max_poll_attempts: u32) -> PipelineConfig {
        PipelineConfig {
            max_poll_attempts,
            poll_interval_ms: 10,
            ..PipelineConfig::default()
        }
    }

    fn found() -> FinalizedRecord {
        FinalizedRecord::from_raw_log_json("AB12", 7, 0, "[]").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_found() {
        let mut query = MockTxQuery::new();
        let mut seq = Sequence::new();
        query
            .expect_query_tx_by_hash()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        query
            .expect_query_tx_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(found())));

        let (emitter, _rx, handle) = Emitter::channel(8);
        let record = TxPoller::new(Arc::new(query), &config(5))
            .poll(&context(), &emitter, &handle.token())
            .await
            .unwrap();

        assert_eq!(record.height, 7);
        assert_eq!(emitter.emitted(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_carries_hash() {
        let mut query = MockTxQuery::new();
        query.expect_query_tx_by_hash().times(3).returning(|_| Ok(None));

        let (emitter, _rx, handle) = Emitter::channel(8);
        let err = TxPoller::new(Arc::new(query), &config(3))
            .poll(&context(), &emitter, &handle.token())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TxError::Timeout {
                tx_hash: "AB12".to_string(),
                attempts: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_are_transient() {
        let mut query = MockTxQuery::new();
        let mut seq = Sequence::new();
        query
            .expect_query_tx_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TxError::Query("502".to_string())));
        query
            .expect_query_tx_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(found())));

        let (emitter, _rx, handle) = Emitter::channel(8);
        let result = TxPoller::new(Arc::new(query), &config(3))
            .poll(&context(), &emitter, &handle.token())
            .await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_failure() {
        let mut query = MockTxQuery::new();
        query.expect_query_tx_by_hash().returning(|_| {
            Ok(Some(
                FinalizedRecord::from_raw_log_json("AB12", 7, 5, "out of gas").unwrap(),
            ))
        });

        let (emitter, _rx, handle) = Emitter::channel(8);
        let err = TxPoller::new(Arc::new(query), &config(3))
            .poll(&context(), &emitter, &handle.token())
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Execution { code: 5, .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let mut query = MockTxQuery::new();
        query.expect_query_tx_by_hash().times(0);

        let (emitter, _rx, handle) = Emitter::channel(8);
        handle.cancel();

        let err = TxPoller::new(Arc::new(query), &config(3))
            .poll(&context(), &emitter, &handle.token())
            .await
            .unwrap_err();
        assert_eq!(err, TxError::Cancelled);
        assert_eq!(emitter.emitted(), 0);
    }
}
