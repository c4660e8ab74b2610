//! Post stage: hand the request to the wallet for signing and broadcast

use super::helper::TxContext;
use super::request::TransactionRequest;
use crate::error::TxResult;
use crate::pipeline::Emitter;
use crate::rendering::{TxResultRendering, TxStreamPhase};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Identifies a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub network: String,
}

impl BroadcastResult {
    /// Whether the hash looks like a chain transaction hash
    pub fn is_hex_hash(&self) -> bool {
        !self.tx_hash.is_empty() && hex::decode(&self.tx_hash).is_ok()
    }
}

/// Wallet signing and broadcast capability.
///
/// Implementations reject with `UserDenied` when the user declines to sign,
/// `Wallet` for wallet-side failures and `Broadcast` when the network
/// refuses the submission.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn post(&self, request: &TransactionRequest) -> TxResult<BroadcastResult>;
}

/// Submits requests through an injected broadcaster
pub struct TxPoster<B: ?Sized> {
    broadcaster: Arc<B>,
}

impl<B: Broadcaster + ?Sized> TxPoster<B> {
    pub fn new(broadcaster: Arc<B>) -> Self {
        Self { broadcaster }
    }

    /// Post the saved request exactly once and store the result
    pub async fn post(&self, ctx: TxContext, emitter: &Emitter) -> TxResult<TxContext> {
        let request = ctx.saved_tx()?;

        let result = match self.broadcaster.post(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Broadcast rejected: {}", e);
                return Err(e);
            }
        };
        // The transaction is already submitted whatever the hash looks like
        if !result.is_hex_hash() {
            warn!("Wallet returned a non-hex transaction hash: {:?}", result.tx_hash);
        }

        info!(
            "Transaction broadcast: {} on {} ({} msgs)",
            result.tx_hash,
            result.network,
            request.msgs.len()
        );

        let ctx = ctx.save_tx_result(result)?;
        emitter
            .emit(TxResultRendering::in_progress(
                TxStreamPhase::Broadcast,
                ctx.partial_receipts(),
            ))
            .await;

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::TxError;
    use crate::tx::request::{Coin, Fee, Msg};
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
        TxContext::new(Arc::new(Settings::default()), "1").save_tx(request)
    }

    #[tokio::test]
    async fn test_post_saves_result_and_emits_broadcast_phase() {
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_post().times(1).returning(|_| {
            Ok(BroadcastResult {
                tx_hash: "ABCDEF0123".to_string(),
                network: "phoenix-1".to_string(),
            })
        });

        let (emitter, mut rx, _cancel) = Emitter::channel(4);
        let ctx = TxPoster::new(Arc::new(broadcaster))
            .post(context(), &emitter)
            .await
            .unwrap();

        assert_eq!(ctx.tx_hash(), Some("ABCDEF0123"));
        let progress = rx.recv().await.unwrap();
        assert_eq!(progress.phase, TxStreamPhase::Broadcast);
        assert_eq!(progress.receipts[0].name, "Tx Hash");
    }

    #[tokio::test]
    async fn test_user_denied_propagates() {
        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_post()
            .times(1)
            .returning(|_| Err(TxError::UserDenied));

        let (emitter, _rx, _cancel) = Emitter::channel(4);
        let err = TxPoster::new(Arc::new(broadcaster))
            .post(context(), &emitter)
            .await
            .unwrap_err();

        assert_eq!(err, TxError::UserDenied);
        assert_eq!(emitter.emitted(), 0);
    }

    #[tokio::test]
    async fn test_non_hex_hash_is_kept() {
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_post().times(1).returning(|_| {
            Ok(BroadcastResult {
                tx_hash: "not-hex".to_string(),
                network: "phoenix-1".to_string(),
            })
        });

        let (emitter, mut rx, _cancel) = Emitter::channel(4);
        let ctx = TxPoster::new(Arc::new(broadcaster))
            .post(context(), &emitter)
            .await
            .unwrap();

        assert_eq!(ctx.tx_hash(), Some("not-hex"));
        let progress = rx.recv().await.unwrap();
        assert_eq!(progress.receipts[0].name, "Tx Hash");
    }

    #[test]
    fn test_hex_hash_check() {
        let result = |hash: &str| BroadcastResult {
            tx_hash: hash.to_string(),
            network: "phoenix-1".to_string(),
        };
        assert!(result("ABCDEF0123").is_hex_hash());
        assert!(!result("not-hex").is_hex_hash());
        assert!(!result("").is_hex_hash());
    }

    #[tokio::test]
    async fn test_post_without_request_is_illegal_state() {
        let broadcaster = MockBroadcaster::new();
        let (emitter, _rx, _cancel) = Emitter::channel(4);
        let ctx = TxContext::new(Arc::new(Settings::default()), "1");

        let err = TxPoster::new(Arc::new(broadcaster))
            .post(ctx, &emitter)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::IllegalState(_)));
    }
}
