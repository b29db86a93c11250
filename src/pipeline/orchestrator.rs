// file: src/pipeline/orchestrator.rs
// description: coordinates partitioning, dispatch, checkpointing, retry and merge
// reference: orchestrates the resumable extraction workflow

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::models::{Catalog, CheckpointSnapshot, Chunk, ChunkPlan, MergedOutput};
use crate::pipeline::dispatcher::{DispatchStrategy, Dispatcher};
use crate::pipeline::merger::Merger;
use crate::pipeline::partition::Partitioner;
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::pipeline::recorder::OutcomeRecorder;
use crate::pipeline::report::{RunReport, StatusReport};
use crate::pipeline::retry::{RetryCoordinator, RetrySummary};
use crate::worker::{InvocationParams, Worker};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Pipeline {
    config: Config,
    store: Arc<dyn CheckpointStore>,
    dispatcher: Dispatcher,
    /// `Some(colored)` draws progress bars; `None` only counts.
    progress: Option<bool>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        store: Arc<dyn CheckpointStore>,
        worker: Arc<dyn Worker>,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(
            worker,
            config.pipeline.max_concurrency,
            config.pipeline.invocation_timeout(),
        )?;

        Ok(Self {
            config,
            store,
            dispatcher,
            progress: None,
        })
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.dispatcher = self.dispatcher.with_strategy(strategy);
        self
    }

    pub fn with_progress(mut self, colored: bool) -> Self {
        self.progress = Some(colored);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reuses the stored plan when it was built from the same catalog and
    /// chunk size; otherwise partitions afresh. `fresh` wipes the store first.
    pub fn prepare_plan(&self, catalog: &Catalog, fresh: bool) -> Result<ChunkPlan> {
        let partitioner = Partitioner::new(self.config.pipeline.chunk_size)?;

        if fresh {
            warn!("Discarding existing checkpoints");
            self.store.clear()?;
        }

        let fingerprint = catalog.fingerprint();
        if let Some(plan) = self.store.load_plan()? {
            if plan.matches(&fingerprint, partitioner.chunk_size()) {
                info!(
                    "Resuming existing plan with {} chunks (created {})",
                    plan.total_chunks(),
                    plan.created_at.to_rfc3339()
                );
                return Ok(plan);
            }
            return Err(PipelineError::InvalidConfiguration(
                "checkpoints belong to a different catalog or chunk_size; rerun with --fresh"
                    .to_string(),
            ));
        }

        let plan = partitioner.plan(catalog);
        self.store.save_plan(&plan)?;
        info!(
            "Partitioned {} endpoints in {} categories into {} chunks",
            catalog.endpoint_count(),
            catalog.categories.len(),
            plan.total_chunks()
        );
        Ok(plan)
    }

    pub fn load_plan(&self) -> Result<ChunkPlan> {
        self.store.load_plan()?.ok_or_else(|| {
            PipelineError::Config("no chunk plan found; run the pipeline first".to_string())
        })
    }

    pub async fn run(&self, catalog: &Catalog, fresh: bool) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting extraction run {}", run_id);

        let plan = self.prepare_plan(catalog, fresh)?;
        let gaps = self.store.list_pending_or_failed(plan.total_chunks())?;
        let resumed = plan.total_chunks() - gaps.len();
        if resumed > 0 {
            info!("{} chunks already succeeded, skipping them", resumed);
        }

        let progress = self.tracker(gaps.len());
        self.first_pass(&plan, &gaps, &progress).await?;

        let mut retry = None;
        let failed = self.store.list_pending_or_failed(plan.total_chunks())?;
        if !failed.is_empty() {
            if self.config.pipeline.auto_retry {
                retry = Some(self.retry_ids(&plan, &failed, Some(&progress)).await?);
            } else {
                warn!(
                    "{} chunks failed; automatic retry disabled",
                    failed.len()
                );
            }
        }

        let stats = progress.get_stats();
        progress.finish();

        let (merged, snapshot) = self.merge(&plan)?;
        let status = StatusReport::from_snapshot(&plan, &snapshot);
        log_final_stats(&stats, &status);

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            resumed,
            status,
            retry,
            stats,
            merged,
        })
    }

    /// Retries every chunk the store reports as unresolved.
    pub async fn retry(&self, plan: &ChunkPlan) -> Result<RetrySummary> {
        let failed = self.store.list_pending_or_failed(plan.total_chunks())?;
        if failed.is_empty() {
            info!("Nothing to retry, all {} chunks succeeded", plan.total_chunks());
            return Ok(RetrySummary::default());
        }

        let progress = self.tracker(failed.len());
        let summary = self.retry_ids(plan, &failed, Some(&progress)).await?;
        progress.finish();
        Ok(summary)
    }

    pub fn status(&self, plan: &ChunkPlan) -> Result<StatusReport> {
        let snapshot = self.store.snapshot(plan.total_chunks())?;
        Ok(StatusReport::from_snapshot(plan, &snapshot))
    }

    pub fn merge(&self, plan: &ChunkPlan) -> Result<(MergedOutput, CheckpointSnapshot)> {
        let snapshot = self.store.snapshot(plan.total_chunks())?;
        let merged = Merger::new(self.config.merge.canonicalize_category_names).merge(&snapshot);
        Ok((merged, snapshot))
    }

    async fn first_pass(
        &self,
        plan: &ChunkPlan,
        gaps: &BTreeSet<usize>,
        progress: &ProgressTracker,
    ) -> Result<()> {
        let chunks: Vec<Chunk> = gaps
            .iter()
            .filter_map(|id| plan.chunk(*id).cloned())
            .collect();
        if chunks.is_empty() {
            return Ok(());
        }

        info!(
            "Dispatching {} chunks with {} concurrent workers",
            chunks.len(),
            self.dispatcher.max_concurrency()
        );
        progress.reset_pass(chunks.len(), "first pass");

        let mut recorder = OutcomeRecorder::new(self.store.as_ref()).with_progress(Some(progress));
        recorder.mark_pending(&chunks)?;

        let params = InvocationParams::new(self.config.pipeline.temperature);
        self.dispatcher
            .dispatch_with(chunks, params, |chunk, outcome| {
                recorder.record(chunk, outcome).map(|_| ())
            })
            .await?;

        Ok(())
    }

    async fn retry_ids(
        &self,
        plan: &ChunkPlan,
        failed: &BTreeSet<usize>,
        progress: Option<&ProgressTracker>,
    ) -> Result<RetrySummary> {
        RetryCoordinator::new(self.store.as_ref(), &self.dispatcher, self.config.retry.clone())?
            .with_progress(progress)
            .retry(plan, failed)
            .await
    }

    fn tracker(&self, total: usize) -> ProgressTracker {
        match self.progress {
            Some(colored) => ProgressTracker::with_color(total, colored),
            None => ProgressTracker::hidden(total),
        }
    }
}

fn log_final_stats(stats: &PipelineStats, status: &StatusReport) {
    info!("=== Extraction Summary ===");
    info!("Duration: {} seconds", stats.duration_secs);
    info!(
        "Chunks dispatched: {} ({:.2} per second, {:.2}% accepted)",
        stats.chunks_dispatched,
        stats.chunks_per_second(),
        stats.success_rate()
    );
    info!("Chunks succeeded: {}/{}", status.succeeded, status.total_expected);
    info!("Success rate: {:.2}%", status.success_rate);
    info!("Records in merged output: {}", status.records);
    if !status.is_complete() {
        warn!("Unresolved chunks: {}", status.failed_count);
    }
    info!("==========================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
    use crate::models::CheckpointStatus;
    use crate::pipeline::partition::tests::category;
    use crate::worker::{MockResponse, MockWorker};
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(auto_retry: bool) -> Config {
        let mut config = Config::default_config();
        config.pipeline.auto_retry = auto_retry;
        config.pipeline.invocation_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_first_pass_failures_feed_retry() {
        let catalog = Catalog::new(vec![category("Repos", 15)]);
        let worker = Arc::new(MockWorker::new().script(
            1,
            vec![MockResponse::Hang(Duration::from_secs(3))],
        ));
        let store = Arc::new(MemoryCheckpointStore::new());

        let pipeline = Pipeline::new(config(false), store.clone(), worker.clone()).unwrap();
        let report = pipeline.run(&catalog, false).await.unwrap();

        assert_eq!(report.status.total_expected, 3);
        assert_eq!(report.status.succeeded, 2);
        assert_eq!(report.status.unresolved.len(), 1);
        assert_eq!(report.status.unresolved[0].chunk_id, 1);
        assert!(report.status.unresolved[0].reason.contains("timed out"));
        assert_eq!(
            store.get(1).unwrap().unwrap().status,
            CheckpointStatus::Failed
        );

        let plan = pipeline.load_plan().unwrap();
        let summary = pipeline.retry(&plan).await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(worker.calls_for(1).len(), 2);
        assert_eq!(worker.calls().len(), 4);

        let (merged, _) = pipeline.merge(&plan).unwrap();
        assert_eq!(merged.total_records(), 15);
    }

    #[tokio::test]
    async fn test_auto_retry_recovers_and_reports_exhausted() {
        let catalog = Catalog::new(vec![
            category("Repos", 4),
            category("Users", 2),
            category("Orgs", 1),
        ]);
        let worker = Arc::new(
            MockWorker::new()
                .script(0, vec![MockResponse::Fail("rate limited".to_string())])
                .script(
                    2,
                    vec![
                        MockResponse::Payload("not json".to_string()),
                        MockResponse::Payload("{\"categories\": []}".to_string()),
                        MockResponse::Payload("{}".to_string()),
                    ],
                ),
        );
        let store = Arc::new(MemoryCheckpointStore::new());

        let pipeline = Pipeline::new(config(true), store, worker.clone()).unwrap();
        let report = pipeline.run(&catalog, false).await.unwrap();

        let retry = report.retry.as_ref().unwrap();
        assert_eq!(retry.attempted, 2);
        assert_eq!(retry.succeeded, 1);
        assert_eq!(report.status.succeeded, 2);
        assert_eq!(report.status.unresolved.len(), 1);
        assert_eq!(report.status.unresolved[0].chunk_id, 2);
        assert_eq!(report.status.unresolved[0].attempts, 3);

        assert_eq!(report.merged.category("Repos").unwrap().records.len(), 4);
        assert_eq!(report.merged.category("Users").unwrap().records.len(), 2);
        assert!(report.merged.category("Orgs").is_none());
    }

    #[tokio::test]
    async fn test_resume_skips_succeeded_chunks() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new(vec![category("Repos", 12)]);

        {
            let worker = Arc::new(
                MockWorker::new().script(2, vec![MockResponse::Fail("crash".to_string())]),
            );
            let store = Arc::new(FileCheckpointStore::new(dir.path()).unwrap());
            let pipeline = Pipeline::new(config(false), store, worker).unwrap();
            let report = pipeline.run(&catalog, false).await.unwrap();
            assert_eq!(report.status.succeeded, 2);
        }

        let worker = Arc::new(MockWorker::new());
        let store = Arc::new(FileCheckpointStore::new(dir.path()).unwrap());
        let pipeline = Pipeline::new(config(false), store, worker.clone()).unwrap();
        let report = pipeline.run(&catalog, false).await.unwrap();

        assert_eq!(report.resumed, 2);
        assert!(report.status.is_complete());
        let called: Vec<usize> = worker.calls().iter().map(|c| c.chunk_id).collect();
        assert_eq!(called, vec![2]);
        assert_eq!(report.merged.total_records(), 12);
    }

    #[tokio::test]
    async fn test_changed_catalog_requires_fresh() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let worker = Arc::new(MockWorker::new());
        let pipeline = Pipeline::new(config(false), store, worker).unwrap();

        pipeline
            .run(&Catalog::new(vec![category("Repos", 3)]), false)
            .await
            .unwrap();

        let changed = Catalog::new(vec![category("Repos", 4)]);
        assert!(matches!(
            pipeline.run(&changed, false).await,
            Err(PipelineError::InvalidConfiguration(_))
        ));

        let report = pipeline.run(&changed, true).await.unwrap();
        assert_eq!(report.resumed, 0);
        assert_eq!(report.merged.total_records(), 4);
    }

    #[tokio::test]
    async fn test_invalid_chunk_size_aborts_before_dispatch() {
        let mut config = config(false);
        config.pipeline.chunk_size = 0;
        let worker = Arc::new(MockWorker::new());
        let pipeline =
            Pipeline::new(config, Arc::new(MemoryCheckpointStore::new()), worker.clone()).unwrap();

        let result = pipeline
            .run(&Catalog::new(vec![category("Repos", 3)]), false)
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidConfiguration(_))));
        assert!(worker.calls().is_empty());
    }
}
