//! pwgate-fanout - Race-based aggregation across redundant gateways
//!
//! Dispatches one inbound request to every configured handler concurrently
//! and resolves a single response: the first success wins outright, soft
//! timeouts are ignored, and the first hard failure is kept as the answer
//! of last resort.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use pwgate_core::{ProxyResponse, RequestHandler};

/// Composes a list of request handlers behind the same capability.
///
/// Redundant backends may be transiently offline: a soft timeout from a
/// still-booting backend must not poison the aggregate result, while a
/// definitive failure from one backend is remembered rather than dropped,
/// until a success preempts it.
pub struct FanOut {
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl FanOut {
    pub fn new(handlers: Vec<Arc<dyn RequestHandler>>) -> Self {
        Self { handlers }
    }

    /// Dispatch `path` to every handler concurrently and pick one response.
    ///
    /// Selection is strictly by completion order:
    /// - the first success (status 200) wins outright and the remaining
    ///   dispatches are aborted, even if hard failures completed earlier;
    /// - a 408 completion means "backend not ready" and is never selected
    ///   as the reportable error;
    /// - among hard failures, only the first to complete is retained.
    ///
    /// If every handler completes without a success, the retained hard
    /// failure is returned; with none of those either — including the case
    /// of zero configured handlers — the result is an empty 417.
    pub async fn dispatch(&self, path: &str) -> ProxyResponse {
        if self.handlers.is_empty() {
            return ProxyResponse::empty(417);
        }

        let (tx, mut rx) = mpsc::channel(self.handlers.len());
        let _tasks = AbortOnDrop(
            self.handlers
                .iter()
                .map(|handler| {
                    let handler = handler.clone();
                    let tx = tx.clone();
                    let path = path.to_string();
                    tokio::spawn(async move {
                        let _ = tx.send(handler.handle(&path).await).await;
                    })
                })
                .collect(),
        );
        drop(tx);

        let mut first_failure: Option<ProxyResponse> = None;
        while let Some(response) = rx.recv().await {
            if response.is_success() {
                // The race is decided; the losing dispatches are aborted.
                return response;
            }
            if response.is_soft_timeout() {
                // Backend not ready yet; wait for the others.
                continue;
            }
            if first_failure.is_none() {
                first_failure = Some(response);
            }
        }

        match first_failure {
            Some(failure) => failure,
            None => {
                debug!(path, "no usable answer from any backend");
                ProxyResponse::empty(417)
            }
        }
    }
}

#[async_trait]
impl RequestHandler for FanOut {
    async fn handle(&self, path: &str) -> ProxyResponse {
        self.dispatch(path).await
    }
}

/// Aborts the dispatched sub-requests once the aggregate request is
/// decided or abandoned.
struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}
