// file: src/checkpoint/mod.rs
// description: key-value checkpoint interface and its backings
// reference: per-key atomic put/get keyed by chunk id

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use crate::error::Result;
use crate::models::{CheckpointEntry, CheckpointSnapshot, ChunkPlan};
use std::collections::{BTreeMap, BTreeSet};

/// Durable mapping from chunk id to its latest outcome.
///
/// Writes overwrite: only the latest entry per chunk id is retained. Any id
/// in `[0, total_chunks)` without a succeeded entry is a gap eligible for retry.
pub trait CheckpointStore: Send + Sync {
    fn put(&self, entry: &CheckpointEntry) -> Result<()>;

    fn get(&self, chunk_id: usize) -> Result<Option<CheckpointEntry>>;

    fn save_plan(&self, plan: &ChunkPlan) -> Result<()>;

    fn load_plan(&self) -> Result<Option<ChunkPlan>>;

    /// Drops every entry and the stored plan.
    fn clear(&self) -> Result<()>;

    fn list_pending_or_failed(&self, total_chunks: usize) -> Result<BTreeSet<usize>> {
        let mut gaps = BTreeSet::new();
        for chunk_id in 0..total_chunks {
            let succeeded = self
                .get(chunk_id)?
                .is_some_and(|entry| entry.is_succeeded());
            if !succeeded {
                gaps.insert(chunk_id);
            }
        }
        Ok(gaps)
    }

    fn snapshot(&self, total_chunks: usize) -> Result<CheckpointSnapshot> {
        let mut entries = BTreeMap::new();
        for chunk_id in 0..total_chunks {
            if let Some(entry) = self.get(chunk_id)? {
                entries.insert(chunk_id, entry);
            }
        }
        Ok(CheckpointSnapshot {
            total_chunks,
            entries,
        })
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every backing must satisfy; run from each backing's tests.

    use super::CheckpointStore;
    use crate::models::{CheckpointEntry, Chunk, ChunkResult};

    pub fn chunk(chunk_id: usize) -> Chunk {
        Chunk {
            chunk_id,
            category_name: "Repos".to_string(),
            category_description: "Repository endpoints".to_string(),
            category_index: 0,
            endpoints: vec![],
            total_chunks: 4,
        }
    }

    pub fn result(name: &str) -> ChunkResult {
        ChunkResult {
            category_name: name.to_string(),
            category_description: "desc".to_string(),
            records: vec![],
        }
    }

    pub fn overwrite_keeps_latest(store: &dyn CheckpointStore) {
        store
            .put(&CheckpointEntry::succeeded(2, result("first"), 1))
            .unwrap();
        store
            .put(&CheckpointEntry::succeeded(2, result("second"), 2))
            .unwrap();

        let entry = store.get(2).unwrap().unwrap();
        assert_eq!(entry.category_name, "second");
        assert_eq!(entry.attempt_count, 2);
        assert_eq!(store.snapshot(4).unwrap().entries.len(), 1);
    }

    pub fn gaps_are_ids_without_success(store: &dyn CheckpointStore) {
        store
            .put(&CheckpointEntry::succeeded(0, result("Repos"), 1))
            .unwrap();
        store
            .put(&CheckpointEntry::failed(&chunk(1), 1, "timeout".to_string()))
            .unwrap();
        store.put(&CheckpointEntry::pending(&chunk(3), 0)).unwrap();

        let gaps: Vec<usize> = store.list_pending_or_failed(4).unwrap().into_iter().collect();
        assert_eq!(gaps, vec![1, 2, 3]);

        store
            .put(&CheckpointEntry::succeeded(1, result("Repos"), 2))
            .unwrap();
        let gaps: Vec<usize> = store.list_pending_or_failed(4).unwrap().into_iter().collect();
        assert_eq!(gaps, vec![2, 3]);
    }
}
