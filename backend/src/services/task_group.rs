//! Bounded, cancellable fan-out of per-entity work
//!
//! At most `concurrency` jobs run at once. Cancelling stops new jobs from
//! being launched; jobs already started run to completion, so an entity is
//! either fully recomputed and written or never touched.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Cancellation signal shared between the launcher and its callers
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Stop launching new work. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot fail before cancellation
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// What a bounded run produced
#[derive(Debug)]
pub struct BoundedOutcome<T> {
    /// Results of finished jobs, in input order
    pub completed: Vec<T>,
    /// Jobs never launched because of cancellation
    pub skipped: usize,
    /// Jobs that panicked
    pub panicked: usize,
}

/// Run `job` over every item with at most `concurrency` in flight
pub async fn run_bounded<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancelHandle,
    job: F,
) -> BoundedOutcome<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut skipped = 0;

    for (index, item) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            skipped += 1;
            continue;
        }
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = cancel.cancelled() => {
                skipped += 1;
                continue;
            }
        };
        // Cancellation may have landed while waiting for a slot
        if cancel.is_cancelled() {
            drop(permit);
            skipped += 1;
            continue;
        }
        let fut = job(item);
        tasks.spawn(async move {
            let _permit = permit;
            (index, fut.await)
        });
    }

    let mut completed = Vec::new();
    let mut panicked = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => completed.push(result),
            Err(err) => {
                tracing::error!(error = %err, "Reconciliation job failed to complete");
                panicked += 1;
            }
        }
    }
    completed.sort_by_key(|(index, _)| *index);

    BoundedOutcome {
        completed: completed.into_iter().map(|(_, result)| result).collect(),
        skipped,
        panicked,
    }
}
