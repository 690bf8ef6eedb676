//! Bounded-concurrency execution of per-entity work.

use std::{future::Future, sync::Arc};

use futures::{stream, StreamExt};
use tokio::sync::Semaphore;
use tracing::warn;

/// Runs batches of independent per-entity operations under a pool-wide cap.
///
/// Every clone shares the same semaphore, so the cap holds across all concurrently running passes
/// rather than per pass.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl BatchRunner {
    /// Creates a runner allowing at most `limit` operations in flight. A zero limit is raised to
    /// one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Returns the cap.
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Applies `op` to every item, at most [`limit`](Self::limit) at a time across the whole pool.
    ///
    /// Operations are fault-isolated: they return nothing, so one entity's failure cannot stop the
    /// rest of the batch.
    pub async fn for_each<T, F, Fut>(&self, items: Vec<T>, op: F)
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        stream::iter(items)
            .for_each_concurrent(self.limit, |item| {
                let work = op(item);
                async move {
                    match self.permits.acquire().await {
                        Ok(_permit) => work.await,
                        Err(_) => warn!("batch pool is closed, skipping entity"),
                    }
                }
            })
            .await;
    }
}
