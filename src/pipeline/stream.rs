//! Consumer handle for a spawned pipeline run

use super::cancel::CancelHandle;
use crate::rendering::TxResultRendering;

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Stream of renderings for one run.
///
/// Dropping the stream cancels the run.
pub struct TxStream {
    rx: mpsc::Receiver<TxResultRendering>,
    cancel: CancelHandle,
    task: Option<JoinHandle<Option<TxResultRendering>>>,
}

impl TxStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<TxResultRendering>,
        cancel: CancelHandle,
        task: JoinHandle<Option<TxResultRendering>>,
    ) -> Self {
        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Next rendering, or `None` once the run has ended
    pub async fn next(&mut self) -> Option<TxResultRendering> {
        self.rx.recv().await
    }

    /// Request cancellation; nothing more is emitted afterwards
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle that can cancel this run from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain the stream and return the terminal rendering.
    ///
    /// `None` if the run was cancelled.
    pub async fn outcome(mut self) -> Option<TxResultRendering> {
        // The task owns the emitter, so the channel closes once it is done
        let mut last = None;
        while let Some(rendering) = self.rx.recv().await {
            if rendering.is_terminal() {
                last = Some(rendering);
            }
        }

        match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Pipeline task failed: {}", e);
                    None
                }
            },
            None => last,
        }
    }
}

impl Stream for TxStream {
    type Item = TxResultRendering;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TxStream {
    fn drop(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            self.cancel.cancel();
        }
    }
}
