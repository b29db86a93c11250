// file: src/pipeline/recorder.rs
// description: turns dispatch outcomes into checkpoint entries
// reference: pending at dispatch, succeeded only after the guardrail, failed otherwise

use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::models::{CheckpointEntry, Chunk};
use crate::pipeline::dispatcher::ChunkOutcome;
use crate::pipeline::guardrail::Guardrail;
use crate::pipeline::progress::ProgressTracker;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Succeeded { records: usize },
    Failed { reason: String },
}

/// Writes checkpoint state at the chunk boundary. Invocation and validation
/// errors end here as `failed` entries; only store errors propagate.
pub struct OutcomeRecorder<'a> {
    store: &'a dyn CheckpointStore,
    progress: Option<&'a ProgressTracker>,
    attempts: HashMap<usize, u32>,
}

impl<'a> OutcomeRecorder<'a> {
    pub fn new(store: &'a dyn CheckpointStore) -> Self {
        Self {
            store,
            progress: None,
            attempts: HashMap::new(),
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Marks chunks as pending, keeping their previous attempt counts.
    pub fn mark_pending(&mut self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            let previous = self
                .store
                .get(chunk.chunk_id)?
                .map(|entry| entry.attempt_count)
                .unwrap_or(0);
            self.store.put(&CheckpointEntry::pending(chunk, previous))?;
            self.attempts.insert(chunk.chunk_id, previous);
        }
        Ok(())
    }

    pub fn attempt_count(&self, chunk_id: usize) -> u32 {
        self.attempts.get(&chunk_id).copied().unwrap_or(0)
    }

    pub fn record(&mut self, chunk: &Chunk, outcome: &ChunkOutcome) -> Result<Recorded> {
        let attempt = self.attempt_count(chunk.chunk_id) + 1;
        self.attempts.insert(chunk.chunk_id, attempt);

        let validated = match &outcome.result {
            Ok(raw) => Guardrail::validate_for_chunk(chunk, raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match validated {
            Ok(result) => {
                let records = result.records.len();
                self.store
                    .put(&CheckpointEntry::succeeded(chunk.chunk_id, result, attempt))?;
                if let Some(progress) = self.progress {
                    progress.inc_chunk_succeeded(records);
                }
                debug!(
                    "Chunk {} succeeded with {} records in {:?}",
                    chunk.chunk_id, records, outcome.elapsed
                );
                Ok(Recorded::Succeeded { records })
            }
            Err(reason) => {
                self.store
                    .put(&CheckpointEntry::failed(chunk, attempt, reason.clone()))?;
                if let Some(progress) = self.progress {
                    progress.inc_chunk_failed();
                }
                warn!("Chunk {} recorded as failed: {}", chunk.chunk_id, reason);
                Ok(Recorded::Failed { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::error::PipelineError;
    use crate::models::{Catalog, CheckpointStatus};
    use crate::pipeline::partition::{partition, tests::category};
    use crate::worker::MockWorker;
    use std::time::Duration;

    fn outcome(chunk_id: usize, result: Result<String>) -> ChunkOutcome {
        ChunkOutcome {
            chunk_id,
            result,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_attempts_accumulate_across_passes() {
        let store = MemoryCheckpointStore::new();
        let chunks = partition(&Catalog::new(vec![category("Repos", 4)]), 2).unwrap();

        let mut recorder = OutcomeRecorder::new(&store);
        recorder.mark_pending(&chunks).unwrap();
        assert_eq!(store.get(0).unwrap().unwrap().status, CheckpointStatus::Pending);

        let failed = recorder
            .record(
                &chunks[0],
                &outcome(
                    0,
                    Err(PipelineError::Timeout {
                        chunk_id: 0,
                        timeout_ms: 10,
                    }),
                ),
            )
            .unwrap();
        assert!(matches!(failed, Recorded::Failed { .. }));

        let mut retry = OutcomeRecorder::new(&store);
        retry.mark_pending(&chunks[..1]).unwrap();
        let raw = MockWorker::generated_payload(&chunks[0]);
        let recorded = retry.record(&chunks[0], &outcome(0, Ok(raw))).unwrap();

        assert_eq!(recorded, Recorded::Succeeded { records: 2 });
        let entry = store.get(0).unwrap().unwrap();
        assert!(entry.is_succeeded());
        assert_eq!(entry.attempt_count, 2);
    }

    #[test]
    fn test_rejected_payload_is_not_persisted() {
        let store = MemoryCheckpointStore::new();
        let chunks = partition(&Catalog::new(vec![category("Repos", 2)]), 2).unwrap();
        let mut recorder = OutcomeRecorder::new(&store);
        recorder.mark_pending(&chunks).unwrap();

        let raw = r#"{"categories": [{"name": "Repos", "records": []}]}"#.to_string();
        let recorded = recorder.record(&chunks[0], &outcome(0, Ok(raw))).unwrap();

        let Recorded::Failed { reason } = recorded else {
            panic!("empty records must be rejected");
        };
        assert!(reason.contains("no category contains any records"));
        let entry = store.get(0).unwrap().unwrap();
        assert_eq!(entry.status, CheckpointStatus::Failed);
        assert!(entry.records.is_none());
    }
}
