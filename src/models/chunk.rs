// file: src/models/chunk.rs
// description: bounded work unit and the persisted chunk plan
// reference: one chunk per worker invocation

use super::catalog::EndpointStub;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: usize,
    pub category_name: String,
    pub category_description: String,
    pub category_index: usize,
    pub endpoints: Vec<EndpointStub>,
    pub total_chunks: usize,
}

/// The partition of one catalog, stored beside the checkpoints so chunk ids
/// stay stable when a run is resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub catalog_fingerprint: String,
    pub chunk_size: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn new(catalog_fingerprint: String, chunk_size: usize, chunks: Vec<Chunk>) -> Self {
        Self {
            catalog_fingerprint,
            chunk_size,
            created_at: Utc::now(),
            chunks,
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, chunk_id: usize) -> Option<&Chunk> {
        self.chunks.get(chunk_id).filter(|c| c.chunk_id == chunk_id)
    }

    pub fn matches(&self, fingerprint: &str, chunk_size: usize) -> bool {
        self.catalog_fingerprint == fingerprint && self.chunk_size == chunk_size
    }
}
