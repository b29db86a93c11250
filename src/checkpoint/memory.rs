// file: src/checkpoint/memory.rs
// description: in-memory checkpoint store for tests and dry runs

use super::CheckpointStore;
use crate::error::Result;
use crate::models::{CheckpointEntry, ChunkPlan};
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<BTreeMap<usize, CheckpointEntry>>,
    plan: RwLock<Option<ChunkPlan>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn put(&self, entry: &CheckpointEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry.chunk_id, entry.clone());
        Ok(())
    }

    fn get(&self, chunk_id: usize) -> Result<Option<CheckpointEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&chunk_id)
            .cloned())
    }

    fn save_plan(&self, plan: &ChunkPlan) -> Result<()> {
        *self.plan.write().unwrap_or_else(|e| e.into_inner()) = Some(plan.clone());
        Ok(())
    }

    fn load_plan(&self) -> Result<Option<ChunkPlan>> {
        Ok(self.plan.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
        *self.plan.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::contract;

    #[test]
    fn test_overwrite_keeps_latest() {
        let store = MemoryCheckpointStore::new();
        contract::overwrite_keeps_latest(&store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_gap_detection() {
        let store = MemoryCheckpointStore::new();
        contract::gaps_are_ids_without_success(&store);
    }

    #[test]
    fn test_clear() {
        let store = MemoryCheckpointStore::new();
        store
            .put(&CheckpointEntry::pending(&contract::chunk(0), 0))
            .unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.load_plan().unwrap().is_none());
    }
}
