// file: src/pipeline/dispatcher.rs
// description: bounded concurrent worker invocation over chunks
// reference: buffer_unordered fan-out with per-call timeout and panic isolation

use crate::error::{PipelineError, Result};
use crate::models::Chunk;
use crate::worker::{InvocationParams, Worker};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Who drives the worker calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Up to `max_concurrency` spawned invocations in flight.
    #[default]
    BoundedPool,
    /// One invocation at a time, in chunk order.
    Sequential,
}

/// Result of one invocation, tagged with the chunk it belongs to.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub chunk_id: usize,
    pub result: Result<String>,
    pub elapsed: Duration,
}

impl ChunkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    worker: Arc<dyn Worker>,
    max_concurrency: usize,
    timeout: Duration,
    strategy: DispatchStrategy,
}

impl Dispatcher {
    pub fn new(worker: Arc<dyn Worker>, max_concurrency: usize, timeout: Duration) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            worker,
            max_concurrency,
            timeout,
            strategy: DispatchStrategy::default(),
        })
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Same worker and timeout with a different pool size.
    pub fn with_max_concurrency(&self, max_concurrency: usize) -> Result<Self> {
        Ok(Self::new(Arc::clone(&self.worker), max_concurrency, self.timeout)?
            .with_strategy(self.strategy))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn dispatch(&self, chunks: Vec<Chunk>, params: InvocationParams) -> Vec<ChunkOutcome> {
        // The no-op sink cannot fail.
        self.dispatch_with(chunks, params, |_, _| Ok(()))
            .await
            .unwrap_or_default()
    }

    /// Dispatches every chunk and hands each outcome to `on_outcome` as it
    /// arrives. Worker failures never abort the batch; only an error from
    /// the sink does.
    pub async fn dispatch_with<F>(
        &self,
        chunks: Vec<Chunk>,
        params: InvocationParams,
        mut on_outcome: F,
    ) -> Result<Vec<ChunkOutcome>>
    where
        F: FnMut(&Chunk, &ChunkOutcome) -> Result<()>,
    {
        let total = chunks.len();
        let mut outcomes = Vec::with_capacity(total);

        debug!(
            "Dispatching {} chunks ({:?}, concurrency {}, timeout {:?})",
            total, self.strategy, self.max_concurrency, self.timeout
        );

        match self.strategy {
            DispatchStrategy::Sequential => {
                for chunk in chunks {
                    let (chunk, outcome) =
                        run_isolated(Arc::clone(&self.worker), chunk, params, self.timeout).await;
                    on_outcome(&chunk, &outcome)?;
                    outcomes.push(outcome);
                }
            }
            DispatchStrategy::BoundedPool => {
                let timeout = self.timeout;
                let mut pending = stream::iter(chunks.into_iter().map(|chunk| {
                    let worker = Arc::clone(&self.worker);
                    run_isolated(worker, chunk, params, timeout)
                }))
                .buffer_unordered(self.max_concurrency);

                while let Some((chunk, outcome)) = pending.next().await {
                    on_outcome(&chunk, &outcome)?;
                    outcomes.push(outcome);
                }
            }
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        debug!("Dispatch finished: {} ok, {} failed", total - failed, failed);

        Ok(outcomes)
    }
}

/// Runs one invocation on its own task so a panicking worker only fails its
/// chunk.
async fn run_isolated(
    worker: Arc<dyn Worker>,
    chunk: Chunk,
    params: InvocationParams,
    timeout: Duration,
) -> (Chunk, ChunkOutcome) {
    let chunk_id = chunk.chunk_id;
    let task_chunk = chunk.clone();
    let started = Instant::now();

    let handle = tokio::spawn(async move {
        let invocation = worker.invoke(&task_chunk, &params);
        match tokio::time::timeout(timeout, invocation).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) if e.is_recoverable() => Err(e),
            Ok(Err(e)) => Err(PipelineError::InvocationFailure {
                chunk_id,
                reason: e.to_string(),
            }),
            Err(_) => Err(PipelineError::Timeout {
                chunk_id,
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    });

    let result = match handle.await {
        Ok(result) => result,
        Err(join_err) => {
            error!("Worker task for chunk {} aborted: {}", chunk_id, join_err);
            Err(PipelineError::InvocationFailure {
                chunk_id,
                reason: format!("worker task aborted: {}", join_err),
            })
        }
    };

    if let Err(e) = &result {
        warn!("Chunk {} failed: {}", chunk_id, e);
    }

    let outcome = ChunkOutcome {
        chunk_id,
        result,
        elapsed: started.elapsed(),
    };
    (chunk, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Catalog;
    use crate::pipeline::partition::{partition, tests::category};
    use crate::worker::{MockResponse, MockWorker};

    fn chunks(count: usize) -> Vec<Chunk> {
        partition(&Catalog::new(vec![category("Repos", count * 2)]), 2).unwrap()
    }

    fn dispatcher(worker: Arc<MockWorker>, concurrency: usize) -> Dispatcher {
        Dispatcher::new(worker, concurrency, Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let worker: Arc<dyn Worker> = Arc::new(MockWorker::new());
        assert!(matches!(
            Dispatcher::new(worker, 0, Duration::from_secs(1)),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_every_outcome_is_tagged() {
        let worker = Arc::new(MockWorker::new());
        let outcomes = dispatcher(worker.clone(), 3)
            .dispatch(chunks(6), InvocationParams::new(0.7))
            .await;

        let mut ids: Vec<usize> = outcomes.iter().map(|o| o.chunk_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        assert!(outcomes.iter().all(ChunkOutcome::is_ok));
        assert_eq!(worker.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let worker = Arc::new(MockWorker::new().with_delay(Duration::from_millis(20)));
        dispatcher(worker.clone(), 2)
            .dispatch(chunks(8), InvocationParams::new(0.7))
            .await;

        assert!(worker.peak_concurrency() <= 2);
        assert_eq!(worker.calls().len(), 8);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let worker = Arc::new(
            MockWorker::new()
                .script(0, vec![MockResponse::Fail("rate limited".to_string())])
                .script(1, vec![MockResponse::Hang(Duration::from_secs(5))])
                .script(2, vec![MockResponse::Panic]),
        );

        let outcomes = dispatcher(worker, 3)
            .dispatch(chunks(4), InvocationParams::new(0.7))
            .await;
        assert_eq!(outcomes.len(), 4);

        let by_id = |id: usize| outcomes.iter().find(|o| o.chunk_id == id).unwrap();
        assert!(matches!(
            by_id(0).result,
            Err(PipelineError::InvocationFailure { chunk_id: 0, .. })
        ));
        assert!(matches!(
            by_id(1).result,
            Err(PipelineError::Timeout { chunk_id: 1, .. })
        ));
        assert!(matches!(
            by_id(2).result,
            Err(PipelineError::InvocationFailure { chunk_id: 2, .. })
        ));
        assert!(by_id(3).is_ok());
    }

    #[tokio::test]
    async fn test_sequential_strategy_preserves_order() {
        let worker = Arc::new(MockWorker::new());
        let mut seen = Vec::new();
        dispatcher(worker.clone(), 3)
            .with_strategy(DispatchStrategy::Sequential)
            .dispatch_with(chunks(3), InvocationParams::new(0.7), |chunk, _| {
                seen.push(chunk.chunk_id);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(worker.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_sink_error_propagates() {
        let worker = Arc::new(MockWorker::new());
        let result = dispatcher(worker, 1)
            .dispatch_with(chunks(2), InvocationParams::new(0.7), |_, _| {
                Err(PipelineError::Io(std::io::Error::other("disk full")))
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
