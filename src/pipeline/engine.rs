//! Pipeline orchestrator
//!
//! Runs build -> post -> poll -> auxiliary fetch -> interpret as one
//! cancellable sequence. Any fatal error from a stage is caught at the end
//! and rendered as FAIL; interpretation errors degrade to a SUCCEED that
//! carries a receipt error.

use super::cancel::CancelToken;
use super::emitter::Emitter;
use super::operation::TxOperation;
use super::stream::TxStream;
use crate::config::Settings;
use crate::error::{TxError, TxResult};
use crate::events::{self, FinalizedRecord};
use crate::rendering::{Receipt, TxResultRendering, TxStreamPhase};
use crate::tx::{Broadcaster, FeeBuilder, TransactionRequest, TxContext, TxPoller, TxPoster, TxQuery};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Renders an error into a user-facing message
pub type ErrorReporter = Arc<dyn Fn(&TxError) -> String + Send + Sync>;

/// Callback fired once on a terminal SUCCEED
pub type OnSucceed = Box<dyn FnOnce() + Send>;

/// Fatal stage failure with whatever receipts were already renderable
struct Failure {
    error: TxError,
    receipts: Vec<Receipt>,
}

impl Failure {
    fn at(ctx: &TxContext) -> impl FnOnce(TxError) -> Failure + '_ {
        move |error| Failure {
            error,
            receipts: ctx.partial_receipts(),
        }
    }
}

/// Transaction pipeline bound to a broadcaster and a chain query
#[derive(Clone)]
pub struct TxPipeline {
    settings: Arc<Settings>,
    poster: Arc<TxPoster<dyn Broadcaster>>,
    poller: Arc<TxPoller<dyn TxQuery>>,
    fees: FeeBuilder,
    reporter: ErrorReporter,
}

impl TxPipeline {
    /// Create a new pipeline
    pub fn new(
        settings: Settings,
        broadcaster: Arc<dyn Broadcaster>,
        query: Arc<dyn TxQuery>,
    ) -> Self {
        let fees = FeeBuilder::new(&settings.gas, settings.chain.native_denom.clone());
        let poller = TxPoller::new(query, &settings.pipeline);

        Self {
            settings: Arc::new(settings),
            poster: Arc::new(TxPoster::new(broadcaster)),
            poller: Arc::new(poller),
            fees,
            reporter: Arc::new(|e: &TxError| e.to_string()),
        }
    }

    /// Replace the default error reporter
    pub fn with_error_reporter(
        mut self,
        reporter: impl Fn(&TxError) -> String + Send + Sync + 'static,
    ) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Spawn a run and return a handle streaming its renderings
    pub fn stream<O>(&self, op: O, on_succeed: Option<OnSucceed>) -> TxStream
    where
        O: TxOperation + 'static,
        O::Aux: 'static,
    {
        let (emitter, rx, cancel) = Emitter::channel(self.settings.pipeline.progress_buffer);
        let pipeline = self.clone();
        let reporter = self.reporter.clone();
        let op_name = op.name();
        let token = cancel.token();

        let task = tokio::spawn(async move {
            let run = tokio::spawn({
                let emitter = emitter.clone();
                async move { pipeline.execute(&op, &emitter, &token, on_succeed).await }
            });

            match run.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Pipeline task for {} aborted: {}", op_name, e);
                    let error = TxError::IllegalState(format!("pipeline task aborted: {}", e));
                    crate::metrics::record_tx_failed(op_name, error.stage());
                    let rendering = TxResultRendering::fail(error.clone(), reporter(&error), vec![]);
                    emitter.emit(rendering.clone()).await.then_some(rendering)
                }
            }
        });

        TxStream::new(rx, cancel, task)
    }

    /// Run an operation to completion.
    ///
    /// Returns the terminal rendering, or `None` if the run was cancelled.
    /// After cancellation nothing more is emitted.
    pub async fn execute<O: TxOperation>(
        &self,
        op: &O,
        emitter: &Emitter,
        cancel: &CancelToken,
        on_succeed: Option<OnSucceed>,
    ) -> Option<TxResultRendering> {
        let ctx = TxContext::new(self.settings.clone(), self.tx_fee(op));
        let span = info_span!("tx", op = op.name(), run_id = %ctx.run_id());

        self.execute_in_span(op, ctx, emitter, cancel, on_succeed)
            .instrument(span)
            .await
    }

    async fn execute_in_span<O: TxOperation>(
        &self,
        op: &O,
        ctx: TxContext,
        emitter: &Emitter,
        cancel: &CancelToken,
        on_succeed: Option<OnSucceed>,
    ) -> Option<TxResultRendering> {
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.run(op, ctx, emitter, cancel) => Some(result),
        };

        let rendering = match outcome {
            None
            | Some(Err(Failure {
                error: TxError::Cancelled,
                ..
            })) => {
                info!("Pipeline cancelled");
                crate::metrics::record_tx_cancelled(op.name());
                return None;
            }
            Some(Ok(rendering)) => {
                if rendering.receipt_errors.is_empty() {
                    info!("Pipeline succeeded with {} receipts", rendering.receipts.len());
                } else {
                    warn!(
                        "Pipeline succeeded with degraded receipts: {}",
                        rendering.receipt_errors[0].message
                    );
                    crate::metrics::record_tx_degraded(op.name());
                }
                crate::metrics::record_tx_succeeded(op.name());
                rendering
            }
            Some(Err(Failure { error, receipts })) => {
                error!(
                    tx_hash = error.tx_hash().unwrap_or("-"),
                    "Pipeline failed at {:?} stage: {}",
                    error.stage(),
                    error
                );
                crate::metrics::record_tx_failed(op.name(), error.stage());
                let message = (self.reporter)(&error);
                TxResultRendering::fail(error, message, receipts)
            }
        };

        crate::metrics::record_tx_latency(op.name(), started.elapsed().as_secs_f64());

        let delivered = emitter.emit(rendering.clone()).await;
        if cancel.is_cancelled() {
            info!("Pipeline cancelled before its result was delivered");
            crate::metrics::record_tx_cancelled(op.name());
            return None;
        }

        if delivered && rendering.phase == TxStreamPhase::Succeed {
            if let Some(callback) = on_succeed {
                callback();
            }
        }

        Some(rendering)
    }

    fn tx_fee<O: TxOperation>(&self, op: &O) -> String {
        op.fee()
            .map(|f| f.tx_fee.clone())
            .unwrap_or_else(|| self.settings.gas.fixed_fee.clone())
    }

    /// Build the request for an operation
    pub fn build<O: TxOperation>(&self, op: &O) -> TxResult<TransactionRequest> {
        let msgs = op.build_msgs()?;
        let fee = self
            .fees
            .fee(op.fee().map(|f| f.gas_wanted), &self.tx_fee(op))?;

        TransactionRequest::new(msgs, fee, self.fees.gas_adjustment())
    }

    async fn run<O: TxOperation>(
        &self,
        op: &O,
        ctx: TxContext,
        emitter: &Emitter,
        cancel: &CancelToken,
    ) -> Result<TxResultRendering, Failure> {
        emitter
            .emit(TxResultRendering::in_progress(TxStreamPhase::Post, vec![]))
            .await;

        let request = self.build(op).map_err(Failure::at(&ctx))?;
        info!("Built transaction with {} msgs", request.msgs.len());
        crate::metrics::record_tx_built(op.name());
        let ctx = ctx.save_tx(request);

        let ctx = match self.poster.post(ctx.clone(), emitter).await {
            Ok(ctx) => ctx,
            Err(e) => {
                crate::metrics::record_broadcast_rejected(op.name());
                return Err(Failure::at(&ctx)(e));
            }
        };
        crate::metrics::record_tx_broadcast(op.name());

        let fetched = if self.settings.pipeline.prefetch_auxiliary {
            futures::future::try_join(
                self.poller.poll(&ctx, emitter, cancel),
                fetch_aux(op),
            )
            .await
        } else {
            match self.poller.poll(&ctx, emitter, cancel).await {
                Ok(record) => fetch_aux(op).await.map(|aux| (record, aux)),
                Err(e) => Err(e),
            }
        };
        let (record, aux) = fetched.map_err(|e| {
            if matches!(e, TxError::Timeout { .. }) {
                crate::metrics::record_tx_timeout(op.name());
            }
            Failure::at(&ctx)(e)
        })?;

        emitter
            .emit(TxResultRendering::in_progress(
                TxStreamPhase::Interpret,
                ctx.partial_receipts(),
            ))
            .await;

        Ok(interpret(op, &ctx, &record, aux))
    }
}

async fn fetch_aux<O: TxOperation>(op: &O) -> TxResult<Option<O::Aux>> {
    op.fetch_aux().await.map_err(|e| match e {
        TxError::AuxiliaryQuery(_) => e,
        other => TxError::AuxiliaryQuery(other.to_string()),
    })
}

/// Turn a finalized record into the terminal rendering. Never fails: any
/// problem becomes a degraded SUCCEED.
fn interpret<O: TxOperation>(
    op: &O,
    ctx: &TxContext,
    record: &FinalizedRecord,
    aux: Option<O::Aux>,
) -> TxResultRendering {
    let Some(aux) = aux else {
        return ctx.failed_to_create_receipt(TxError::AuxiliaryUnavailable(format!(
            "{} data",
            op.aux_label()
        )));
    };

    let event = match events::locate_event(record, op.raw_log_index(), op.event_name()) {
        Ok(event) => event,
        Err(TxError::RawLogNotFound { index }) => return ctx.failed_to_find_raw_log(index),
        Err(TxError::EventsNotFound { .. }) => return ctx.failed_to_find_events(&[op.event_name()]),
        Err(e) => return ctx.failed_to_create_receipt(e),
    };

    let interpreted = panic::catch_unwind(AssertUnwindSafe(|| op.interpret(event, aux)))
        .unwrap_or_else(|payload| Err(TxError::Parse(panic_message(payload.as_ref()))));

    match interpreted {
        Ok(mut receipts) => {
            receipts.extend(ctx.closing_receipts());
            TxResultRendering::succeed(receipts)
        }
        Err(e) => {
            warn!("Failed to interpret {} result: {}", op.name(), e);
            ctx.failed_to_parse_tx_result(e.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "interpretation panicked".to_string())
}
