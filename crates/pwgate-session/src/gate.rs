//! Resettable single-flight guard for login sequences

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Ensures at most one login sequence runs at a time, while every concurrent
/// caller waits for the in-flight run to finish. Completion (success or
/// failure) resets the gate, so the next caller starts a brand-new run
/// instead of observing a stale one.
///
/// The state is either idle (`None`) or running (`Some` receiver handed out
/// to joiners). The leader clears the state under the lock before releasing
/// its waiters, so a new generation can only begin once the previous one has
/// fully completed and reset.
#[derive(Debug, Default)]
pub struct LoginGate {
    state: Mutex<Option<watch::Receiver<()>>>,
}

enum Role {
    Leader(watch::Sender<()>),
    Joiner(watch::Receiver<()>),
}

impl LoginGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `attempt` unless a run is already in flight, in which case wait
    /// for that run to finish instead.
    ///
    /// Returns `Some` with the attempt's output for the caller that led the
    /// run, `None` for callers that joined one already in flight. The gate
    /// never retries; a failed attempt still resets it so the next caller
    /// gets a fresh one.
    pub async fn run<F, T>(&self, attempt: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let role = {
            let mut state = self.state.lock();
            match &*state {
                Some(done) => Role::Joiner(done.clone()),
                None => {
                    let (tx, rx) = watch::channel(());
                    *state = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Joiner(mut done) => {
                // Resolves with Err once the leader drops its sender.
                let _ = done.changed().await;
                None
            }
            Role::Leader(tx) => {
                let reset = ResetOnDrop { gate: self };
                let output = attempt.await;
                // Reset first, then release the waiters: a caller arriving
                // in between must find the gate idle.
                drop(reset);
                drop(tx);
                Some(output)
            }
        }
    }
}

/// Clears the running state even if the leader's future is dropped
/// mid-attempt, so an abandoned run cannot wedge the gate shut.
struct ResetOnDrop<'a> {
    gate: &'a LoginGate,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        *self.gate.state.lock() = None;
    }
}
