// file: src/pipeline/partition.rs
// description: splits the endpoint catalog into fixed-size chunks
// reference: global chunk ids with total_chunks backfilled in a second pass

use crate::error::{PipelineError, Result};
use crate::models::{Catalog, Chunk, ChunkPlan};
use tracing::debug;

pub struct Partitioner {
    chunk_size: usize,
}

impl Partitioner {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Every endpoint lands in exactly one chunk, in catalog order. Chunks
    /// never span categories.
    pub fn partition(&self, catalog: &Catalog) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (category_index, category) in catalog.categories.iter().enumerate() {
            for run in category.endpoints.chunks(self.chunk_size) {
                chunks.push(Chunk {
                    chunk_id: chunks.len(),
                    category_name: category.name.clone(),
                    category_description: category.description.clone(),
                    category_index,
                    endpoints: run.to_vec(),
                    total_chunks: 0,
                });
            }
        }

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.total_chunks = total;
        }

        debug!(
            "Partitioned {} endpoints into {} chunks of at most {}",
            catalog.endpoint_count(),
            total,
            self.chunk_size
        );

        chunks
    }

    pub fn plan(&self, catalog: &Catalog) -> ChunkPlan {
        ChunkPlan::new(catalog.fingerprint(), self.chunk_size, self.partition(catalog))
    }
}

pub fn partition(catalog: &Catalog, chunk_size: usize) -> Result<Vec<Chunk>> {
    Ok(Partitioner::new(chunk_size)?.partition(catalog))
}
