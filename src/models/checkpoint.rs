// file: src/models/checkpoint.rs
// description: durable per-chunk processing outcome
// reference: checkpoint record {chunk_id, category, status, attempt_count, records}

use super::chunk::Chunk;
use super::record::{ChunkResult, ExtractionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Succeeded,
    Failed,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Succeeded => "succeeded",
            CheckpointStatus::Failed => "failed",
        }
    }
}

/// Records are only ever present on a succeeded entry; the constructors are
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub chunk_id: usize,
    pub category_name: String,
    pub category_description: String,
    pub status: CheckpointStatus,
    pub attempt_count: u32,
    pub records: Option<Vec<ExtractionRecord>>,
    #[serde(default)]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointEntry {
    pub fn pending(chunk: &Chunk, attempt_count: u32) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            category_name: chunk.category_name.clone(),
            category_description: chunk.category_description.clone(),
            status: CheckpointStatus::Pending,
            attempt_count,
            records: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn succeeded(chunk_id: usize, result: ChunkResult, attempt_count: u32) -> Self {
        Self {
            chunk_id,
            category_name: result.category_name,
            category_description: result.category_description,
            status: CheckpointStatus::Succeeded,
            attempt_count,
            records: Some(result.records),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(chunk: &Chunk, attempt_count: u32, reason: String) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            category_name: chunk.category_name.clone(),
            category_description: chunk.category_description.clone(),
            status: CheckpointStatus::Failed,
            attempt_count,
            records: None,
            error: Some(reason),
            updated_at: Utc::now(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == CheckpointStatus::Succeeded && self.records.is_some()
    }

    pub fn record_count(&self) -> usize {
        self.records.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn payload(&self) -> Option<ChunkResult> {
        if !self.is_succeeded() {
            return None;
        }
        self.records.as_ref().map(|records| ChunkResult {
            category_name: self.category_name.clone(),
            category_description: self.category_description.clone(),
            records: records.clone(),
        })
    }
}

/// Point-in-time view of the store over `[0, total_chunks)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointSnapshot {
    pub total_chunks: usize,
    pub entries: BTreeMap<usize, CheckpointEntry>,
}

impl CheckpointSnapshot {
    pub fn succeeded_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_succeeded()).count()
    }

    pub fn unresolved_ids(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|id| !self.entries.get(id).is_some_and(|e| e.is_succeeded()))
            .collect()
    }

    pub fn succeeded_record_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.is_succeeded())
            .map(CheckpointEntry::record_count)
            .sum()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.succeeded_count() as f64 / self.total_chunks as f64) * 100.0
    }
}
