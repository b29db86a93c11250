// file: src/pipeline/report.rs
// description: operator-facing run, status and gap reports
// reference: best-effort output plus an explicit list of unresolved chunks

use crate::models::{CheckpointSnapshot, CheckpointStatus, ChunkPlan, MergedOutput};
use crate::pipeline::progress::PipelineStats;
use crate::pipeline::retry::RetrySummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedChunk {
    pub chunk_id: usize,
    pub category_name: String,
    /// `None` when the chunk has never been checkpointed.
    pub status: Option<CheckpointStatus>,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total_expected: usize,
    pub succeeded: usize,
    pub failed_count: usize,
    pub success_rate: f64,
    pub records: usize,
    pub unresolved: Vec<UnresolvedChunk>,
}

impl StatusReport {
    pub fn from_snapshot(plan: &ChunkPlan, snapshot: &CheckpointSnapshot) -> Self {
        let unresolved = snapshot
            .unresolved_ids()
            .into_iter()
            .map(|chunk_id| {
                let entry = snapshot.entries.get(&chunk_id);
                let category_name = entry
                    .map(|e| e.category_name.clone())
                    .or_else(|| plan.chunk(chunk_id).map(|c| c.category_name.clone()))
                    .unwrap_or_default();
                let reason = match entry {
                    Some(e) => e.error.clone().unwrap_or_else(|| match e.status {
                        CheckpointStatus::Pending => "interrupted before completion".to_string(),
                        _ => "no reason recorded".to_string(),
                    }),
                    None => "never dispatched".to_string(),
                };

                UnresolvedChunk {
                    chunk_id,
                    category_name,
                    status: entry.map(|e| e.status),
                    attempts: entry.map(|e| e.attempt_count).unwrap_or(0),
                    reason,
                }
            })
            .collect::<Vec<_>>();

        Self {
            total_expected: snapshot.total_chunks,
            succeeded: snapshot.succeeded_count(),
            failed_count: unresolved.len(),
            success_rate: snapshot.success_rate(),
            records: snapshot.succeeded_record_count(),
            unresolved,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Chunks already succeeded before this run started.
    pub resumed: usize,
    pub status: StatusReport,
    pub retry: Option<RetrySummary>,
    pub stats: PipelineStats,
    #[serde(skip)]
    pub merged: MergedOutput,
}
