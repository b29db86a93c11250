// file: src/pipeline/retry.rs
// description: re-dispatches chunks without a succeeded checkpoint
// reference: reduced concurrency and temperature, capped rounds per chunk

use crate::checkpoint::CheckpointStore;
use crate::config::RetryConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Chunk, ChunkPlan};
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::recorder::{OutcomeRecorder, Recorded};
use crate::worker::InvocationParams;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryDetail {
    pub chunk_id: usize,
    pub category_name: String,
    /// Attempts made during this retry call.
    pub attempts: u32,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub details: Vec<RetryDetail>,
}

impl RetrySummary {
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.attempted as f64) * 100.0
    }

    /// Chunks still failing once the cap was reached.
    pub fn exhausted(&self) -> Vec<PipelineError> {
        self.details
            .iter()
            .filter(|d| !d.succeeded)
            .map(|d| PipelineError::ExhaustedRetries {
                chunk_id: d.chunk_id,
                attempts: d.attempts,
                reason: d
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            })
            .collect()
    }
}

pub struct RetryCoordinator<'a> {
    store: &'a dyn CheckpointStore,
    dispatcher: Dispatcher,
    config: RetryConfig,
    progress: Option<&'a ProgressTracker>,
}

impl<'a> RetryCoordinator<'a> {
    /// Derives a smaller pool from the first-pass dispatcher.
    pub fn new(
        store: &'a dyn CheckpointStore,
        dispatcher: &Dispatcher,
        config: RetryConfig,
    ) -> Result<Self> {
        let concurrency = config
            .reduced_concurrency
            .min(dispatcher.max_concurrency())
            .max(1);
        let dispatcher = dispatcher.with_max_concurrency(concurrency)?;

        Ok(Self {
            store,
            dispatcher,
            config,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.dispatcher.max_concurrency()
    }

    /// Retries `failed_ids` that the store still reports as unresolved, for
    /// up to `max_retries` rounds. Succeeded retries are checkpointed as they
    /// land; the rest are reported, never dropped.
    pub async fn retry(&self, plan: &ChunkPlan, failed_ids: &BTreeSet<usize>) -> Result<RetrySummary> {
        let gaps = self.store.list_pending_or_failed(plan.total_chunks())?;
        let mut details: BTreeMap<usize, RetryDetail> = BTreeMap::new();
        let mut remaining: Vec<Chunk> = Vec::new();

        for &chunk_id in failed_ids {
            match plan.chunk(chunk_id) {
                Some(chunk) if gaps.contains(&chunk_id) => {
                    let error = self.store.get(chunk_id)?.and_then(|e| e.error);
                    details.insert(
                        chunk_id,
                        RetryDetail {
                            chunk_id,
                            category_name: chunk.category_name.clone(),
                            attempts: 0,
                            succeeded: false,
                            error,
                        },
                    );
                    remaining.push(chunk.clone());
                }
                Some(_) => {
                    info!("Chunk {} already succeeded, skipping retry", chunk_id);
                }
                None => {
                    warn!("Chunk {} is not part of the current plan", chunk_id);
                    details.insert(
                        chunk_id,
                        RetryDetail {
                            chunk_id,
                            category_name: String::new(),
                            attempts: 0,
                            succeeded: false,
                            error: Some("chunk id is not part of the current plan".to_string()),
                        },
                    );
                }
            }
        }

        info!(
            "Retrying {} chunks with concurrency {} and temperature {:.2} (max {} rounds)",
            remaining.len(),
            self.dispatcher.max_concurrency(),
            self.config.retry_temperature,
            self.config.max_retries
        );

        for round in 1..=self.config.max_retries {
            if remaining.is_empty() {
                break;
            }

            if let Some(progress) = self.progress {
                progress.reset_pass(remaining.len(), &format!("retry round {}", round));
            }

            let mut recorder = OutcomeRecorder::new(self.store).with_progress(self.progress);
            recorder.mark_pending(&remaining)?;

            let params =
                InvocationParams::new(self.config.retry_temperature).with_attempt(round + 1);
            let mut round_failures = BTreeSet::new();

            self.dispatcher
                .dispatch_with(remaining.clone(), params, |chunk, outcome| {
                    let recorded = recorder.record(chunk, outcome)?;
                    if let Some(detail) = details.get_mut(&chunk.chunk_id) {
                        detail.attempts += 1;
                        match recorded {
                            Recorded::Succeeded { .. } => {
                                detail.succeeded = true;
                                detail.error = None;
                            }
                            Recorded::Failed { reason } => {
                                detail.error = Some(reason);
                                round_failures.insert(chunk.chunk_id);
                            }
                        }
                    }
                    Ok(())
                })
                .await?;

            remaining.retain(|chunk| round_failures.contains(&chunk.chunk_id));
            info!(
                "Retry round {} finished, {} chunks still failing",
                round,
                remaining.len()
            );
        }

        let details: Vec<RetryDetail> = details.into_values().collect();
        let succeeded = details.iter().filter(|d| d.succeeded).count();
        let summary = RetrySummary {
            attempted: details.len(),
            succeeded,
            failed: details.len() - succeeded,
            details,
        };

        for exhausted in summary.exhausted() {
            warn!("{}", exhausted);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::config::Config;
    use crate::models::{Catalog, CheckpointEntry};
    use crate::pipeline::partition::{tests::category, Partitioner};
    use crate::worker::{MockResponse, MockWorker};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(worker: Arc<MockWorker>) -> (ChunkPlan, Dispatcher) {
        let plan = Partitioner::new(2)
            .unwrap()
            .plan(&Catalog::new(vec![category("Repos", 6)]));
        let dispatcher = Dispatcher::new(worker, 3, Duration::from_millis(200)).unwrap();
        (plan, dispatcher)
    }

    fn retry_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            ..Config::default_config().retry
        }
    }

    fn seed(store: &MemoryCheckpointStore, plan: &ChunkPlan, failed: &[usize]) {
        for chunk in &plan.chunks {
            let entry = if failed.contains(&chunk.chunk_id) {
                CheckpointEntry::failed(chunk, 1, "timed out".to_string())
            } else {
                let raw = MockWorker::generated_payload(chunk);
                let result = crate::pipeline::guardrail::Guardrail::validate(&raw).unwrap();
                CheckpointEntry::succeeded(chunk.chunk_id, result, 1)
            };
            store.put(&entry).unwrap();
        }
    }

    #[tokio::test]
    async fn test_retries_only_failed_ids_with_lower_temperature() {
        let worker = Arc::new(MockWorker::new());
        let (plan, dispatcher) = setup(worker.clone());
        let store = MemoryCheckpointStore::new();
        seed(&store, &plan, &[1]);

        let coordinator = RetryCoordinator::new(&store, &dispatcher, retry_config(2)).unwrap();
        assert_eq!(coordinator.max_concurrency(), 1);

        let failed = store.list_pending_or_failed(plan.total_chunks()).unwrap();
        let summary = coordinator.retry(&plan, &failed).await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
        let calls = worker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].chunk_id, 1);
        assert!((calls[0].temperature - 0.2).abs() < f32::EPSILON);

        let entry = store.get(1).unwrap().unwrap();
        assert!(entry.is_succeeded());
        assert_eq!(entry.attempt_count, 2);
        assert!(store.list_pending_or_failed(plan.total_chunks()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_chunks_are_reported() {
        let worker = Arc::new(MockWorker::new().script(
            2,
            vec![
                MockResponse::Payload("{}".to_string()),
                MockResponse::Fail("upstream 503".to_string()),
                MockResponse::Generated,
            ],
        ));
        let (plan, dispatcher) = setup(worker.clone());
        let store = MemoryCheckpointStore::new();
        seed(&store, &plan, &[0, 2]);

        let coordinator = RetryCoordinator::new(&store, &dispatcher, retry_config(2)).unwrap();
        let failed = store.list_pending_or_failed(plan.total_chunks()).unwrap();
        let summary = coordinator.retry(&plan, &failed).await.unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(worker.calls_for(2).len(), 2);

        let exhausted = summary.exhausted();
        assert_eq!(exhausted.len(), 1);
        assert!(matches!(
            &exhausted[0],
            PipelineError::ExhaustedRetries { chunk_id: 2, attempts: 2, reason } if reason.contains("upstream 503")
        ));

        let entry = store.get(2).unwrap().unwrap();
        assert!(!entry.is_succeeded());
        assert_eq!(entry.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_skips_ids_that_already_succeeded() {
        let worker = Arc::new(MockWorker::new());
        let (plan, dispatcher) = setup(worker.clone());
        let store = MemoryCheckpointStore::new();
        seed(&store, &plan, &[]);

        let coordinator = RetryCoordinator::new(&store, &dispatcher, retry_config(2)).unwrap();
        let requested: BTreeSet<usize> = [0, 1, 9].into_iter().collect();
        let summary = coordinator.retry(&plan, &requested).await.unwrap();

        assert!(worker.calls().is_empty());
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.details[0].chunk_id, 9);
        assert!(!summary.details[0].succeeded);
    }
}
