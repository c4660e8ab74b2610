//! Progress emission for a pipeline run

use super::cancel::{CancelHandle, CancelToken};
use crate::rendering::TxResultRendering;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Sends renderings to the consumer; goes silent once the run is cancelled
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<TxResultRendering>,
    cancel: CancelToken,
    emitted: Arc<AtomicUsize>,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<TxResultRendering>, cancel: CancelToken) -> Self {
        Self {
            tx,
            cancel,
            emitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Emitter with a fresh channel and cancellation handle
    pub fn channel(
        buffer: usize,
    ) -> (Self, mpsc::Receiver<TxResultRendering>, CancelHandle) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = CancelHandle::new();
        (Self::new(tx, handle.token()), rx, handle)
    }

    /// Emit a rendering. Intermediate renderings are dropped when the
    /// consumer lags; terminal ones wait for buffer space, unless the run is
    /// cancelled while waiting.
    pub async fn emit(&self, rendering: TxResultRendering) -> bool {
        if self.cancel.is_cancelled() {
            debug!("Dropping {:?} emission after cancellation", rendering.phase);
            return false;
        }

        let delivered = if rendering.is_terminal() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Cancelled while waiting to deliver the terminal rendering");
                    false
                }
                sent = self.tx.send(rendering) => sent.is_ok(),
            }
        } else {
            match self.tx.try_send(rendering) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(r)) => {
                    debug!("Consumer lagging, skipping {:?} progress", r.phase);
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        };

        if delivered {
            self.emitted.fetch_add(1, Ordering::SeqCst);
        }
        delivered
    }

    /// Number of renderings delivered so far
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}
