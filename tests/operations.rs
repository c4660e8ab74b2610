//! End-to-end runs of operations against an in-memory wallet and chain

use async_trait::async_trait;
use mm_tx::operations::{
    BorrowAccount, BorrowBorrower, BorrowMarket, BorrowQueries, Collateral, Mint,
    RedeemWrappedCollateral, WrappedCollateral,
};
use mm_tx::tx::Msg;
use mm_tx::{
    BroadcastResult, Broadcaster, ErrorStage, FinalizedRecord, Settings, TransactionRequest,
    TxError, TxPipeline, TxQuery, TxResult, TxStreamPhase,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const HASH: &str = "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08";

#[derive(Default)]
struct Wallet {
    posted: Mutex<Vec<TransactionRequest>>,
}

#[async_trait]
impl Broadcaster for Wallet {
    async fn post(&self, request: &TransactionRequest) -> TxResult<BroadcastResult> {
        self.posted.lock().unwrap().push(request.clone());
        Ok(BroadcastResult {
            tx_hash: HASH.to_string(),
            network: "phoenix-1".to_string(),
        })
    }
}

/// Finds the transaction after `pending` lookups
struct Chain {
    pending: u32,
    lookups: AtomicU32,
    raw_log: String,
}

impl Chain {
    fn new(pending: u32, raw_log: &str) -> Self {
        Self {
            pending,
            lookups: AtomicU32::new(0),
            raw_log: raw_log.to_string(),
        }
    }
}

#[async_trait]
impl TxQuery for Chain {
    async fn query_tx_by_hash(&self, tx_hash: &str) -> TxResult<Option<FinalizedRecord>> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) < self.pending {
            return Ok(None);
        }
        FinalizedRecord::from_raw_log_json(tx_hash, 4_200_000, 0, self.raw_log.clone()).map(Some)
    }
}

struct Position {
    fail_market: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl BorrowQueries for Position {
    async fn market(&self) -> TxResult<Option<BorrowMarket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_market {
            return Err(TxError::Query("market query timed out".to_string()));
        }
        Ok(Some(BorrowMarket {
            oracle_prices: HashMap::from([("terra1wasavax".to_string(), dec("20"))]),
            max_ltvs: HashMap::from([("terra1wasavax".to_string(), dec("0.5"))]),
        }))
    }

    async fn borrower(&self) -> TxResult<Option<BorrowBorrower>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(BorrowBorrower {
            loan_amount: dec("250000000"),
            collaterals: vec![("terra1wasavax".to_string(), dec("100000000"))],
        }))
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn settings() -> Settings {
    Settings::from_toml_str(
        r#"
        [pipeline]
        poll_interval_ms = 50
        max_poll_attempts = 5
        "#,
    )
    .unwrap()
}

const MINT_LOG: &str = r#"[{"msg_index":0,"log":"","events":[
    {"type":"message","attributes":[{"key":"action","value":"/cosmwasm.wasm.v1.MsgExecuteContract"}]},
    {"type":"from_contract","attributes":[
        {"key":"_contract_address","value":"terra1hub"},
        {"key":"action","value":"mint"},
        {"key":"from","value":"terra1user"},
        {"key":"bonded","value":"9500000"},
        {"key":"minted","value":"9400000"}
    ]}
]}]"#;

const REDEEM_WRAPPED_LOG: &str = r#"[
    {"msg_index":0,"events":[{"type":"from_contract","attributes":[
        {"key":"action","value":"unlock_collateral"}
    ]}]},
    {"msg_index":1,"events":[{"type":"from_contract","attributes":[
        {"key":"action","value":"withdraw_collateral"},
        {"key":"amount","value":"50000000"}
    ]}]},
    {"msg_index":2,"events":[{"type":"from_contract","attributes":[
        {"key":"action","value":"burn"},
        {"key":"amount","value":"50000000"}
    ]}]}
]"#;

fn redeem_wrapped(position: Arc<Position>) -> RedeemWrappedCollateral {
    RedeemWrappedCollateral {
        account: BorrowAccount::new("terra1user", "terra1market", "terra1overseer", position),
        wrapped: WrappedCollateral {
            collateral: Collateral {
                token: "terra1wasavax".to_string(),
                custody: "terra1custody".to_string(),
                symbol: "wasAVAX".to_string(),
                decimals: 6,
            },
            underlying_token: "terra1savax".to_string(),
            underlying_symbol: "sAVAX".to_string(),
        },
        amount: "50".to_string(),
        exchange_rate: dec("1.25"),
        fee: None,
    }
}

#[tokio::test(start_paused = true)]
async fn mint_end_to_end() {
    let wallet = Arc::new(Wallet::default());
    let chain = Arc::new(Chain::new(2, MINT_LOG));
    let pipeline = TxPipeline::new(settings(), wallet.clone(), chain.clone());

    let rendering = pipeline
        .stream(
            Mint::new("terra1user", "terra1hub", "10", dec("0.989473")),
            None,
        )
        .outcome()
        .await
        .unwrap();

    let posted = wallet.posted.lock().unwrap().clone();
    assert_eq!(posted.len(), 1);
    match &posted[0].msgs[0] {
        Msg::ExecuteContract { funds, .. } => assert_eq!(funds[0].amount, "10000000"),
    }
    assert_eq!(chain.lookups.load(Ordering::SeqCst), 3);

    assert_eq!(rendering.phase, TxStreamPhase::Succeed);
    let names: Vec<_> = rendering.receipts.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Bonded Amount", "Minted Amount", "Exchange Rate", "Tx Hash", "Tx Fee"]
    );
    assert_eq!(rendering.receipts[0].value.to_string(), "9.5 LUNA");
    assert_eq!(rendering.receipts[1].value.to_string(), "9.4 aLUNA");
    assert!(rendering.receipts[3]
        .value
        .to_string()
        .contains("https://finder.terra.money/phoenix-1/tx/"));
}

#[tokio::test(start_paused = true)]
async fn redeem_wrapped_collateral_end_to_end() {
    let position = Arc::new(Position {
        fail_market: false,
        calls: AtomicUsize::new(0),
    });
    let pipeline = TxPipeline::new(
        settings(),
        Arc::new(Wallet::default()),
        Arc::new(Chain::new(0, REDEEM_WRAPPED_LOG)),
    );

    let rendering = pipeline
        .stream(redeem_wrapped(position.clone()), None)
        .outcome()
        .await
        .unwrap();

    assert_eq!(rendering.phase, TxStreamPhase::Succeed);
    let values: Vec<_> = rendering
        .receipts
        .iter()
        .map(|r| (r.name.as_str(), r.value.to_string()))
        .collect();
    assert_eq!(values[0], ("Redeemed Amount", "50 wasAVAX".to_string()));
    assert_eq!(values[1], ("Withdrawn Amount", "40 sAVAX".to_string()));
    assert_eq!(values[2], ("New Borrow Usage", "25.00 %".to_string()));
    assert_eq!(values[3].0, "Tx Hash");
    assert_eq!(values[4].0, "Tx Fee");
    assert_eq!(position.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_market_query_fails_the_run() {
    let position = Arc::new(Position {
        fail_market: true,
        calls: AtomicUsize::new(0),
    });
    let pipeline = TxPipeline::new(
        settings(),
        Arc::new(Wallet::default()),
        Arc::new(Chain::new(0, REDEEM_WRAPPED_LOG)),
    );
    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = succeeded.clone();

    let rendering = pipeline
        .stream(
            redeem_wrapped(position),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .outcome()
        .await
        .unwrap();

    assert_eq!(rendering.phase, TxStreamPhase::Fail);
    let failure = rendering.failure.unwrap();
    assert_eq!(failure.error.stage(), ErrorStage::Auxiliary);
    assert!(failure.message.contains("market query timed out"));
    assert_eq!(succeeded.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_hash_receipt() {
    let pipeline = TxPipeline::new(
        settings(),
        Arc::new(Wallet::default()),
        Arc::new(Chain::new(u32::MAX, MINT_LOG)),
    );

    let rendering = pipeline
        .stream(Mint::new("terra1user", "terra1hub", "1", Decimal::ONE), None)
        .outcome()
        .await
        .unwrap();

    assert_eq!(rendering.phase, TxStreamPhase::Fail);
    assert_eq!(rendering.receipts.len(), 1);
    assert_eq!(rendering.receipts[0].name, "Tx Hash");
    let failure = rendering.failure.unwrap();
    assert_eq!(
        failure.error,
        TxError::Timeout {
            tx_hash: HASH.to_string(),
            attempts: 5
        }
    );
    assert!(failure.message.contains("may still be included later"));
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_a_pending_run() {
    let pipeline = TxPipeline::new(
        settings(),
        Arc::new(Wallet::default()),
        Arc::new(Chain::new(u32::MAX, MINT_LOG)),
    );

    let mut stream = pipeline.stream(Mint::new("terra1user", "terra1hub", "1", Decimal::ONE), None);
    let first = stream.next().await.unwrap();
    assert_eq!(first.phase, TxStreamPhase::Post);

    stream.cancel();
    assert!(stream.outcome().await.is_none());
}
