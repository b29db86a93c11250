// file: src/pipeline/merger.rs
// description: merges succeeded checkpoints into one document grouped by category
// reference: ascending chunk id concatenation, first-seen category order

use crate::models::{CheckpointSnapshot, MergedCategory, MergedOutput};
use indexmap::IndexMap;
use tracing::debug;

pub struct Merger {
    canonicalize: bool,
}

impl Merger {
    pub fn new(canonicalize: bool) -> Self {
        Self { canonicalize }
    }

    /// Pure function of the snapshot: the same snapshot always yields the
    /// same output. Categories appear in order of first appearance across
    /// ascending chunk ids.
    pub fn merge(&self, snapshot: &CheckpointSnapshot) -> MergedOutput {
        let mut groups: IndexMap<String, MergedCategory> = IndexMap::new();

        // BTreeMap iteration is ascending by chunk id.
        for (chunk_id, entry) in &snapshot.entries {
            if *chunk_id >= snapshot.total_chunks {
                continue;
            }
            let Some(result) = entry.payload() else {
                continue;
            };

            let key = self.group_key(&result.category_name);
            let group = groups.entry(key).or_insert_with(|| MergedCategory {
                name: result.category_name.trim().to_string(),
                description: result.category_description.clone(),
                records: Vec::new(),
            });
            group.records.extend(result.records);
        }

        let merged = MergedOutput {
            categories: groups.into_values().collect(),
        };

        debug!(
            "Merged {} records into {} categories",
            merged.total_records(),
            merged.categories.len()
        );

        merged
    }

    fn group_key(&self, name: &str) -> String {
        if self.canonicalize {
            canonical_category_name(name)
        } else {
            name.to_string()
        }
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Trims, collapses inner whitespace and case-folds a category name.
pub fn canonical_category_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckpointEntry, Chunk, ChunkResult, ExtractionRecord};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn record(name: &str) -> ExtractionRecord {
        ExtractionRecord {
            name: name.to_string(),
            description: String::new(),
            method: "GET".to_string(),
            path: format!("/{}", name),
            headers: vec![],
            path_params: vec![],
            query_params: vec![],
            body_params: vec![],
            responses: BTreeMap::new(),
        }
    }

    fn succeeded(chunk_id: usize, category: &str, names: &[&str]) -> CheckpointEntry {
        CheckpointEntry::succeeded(
            chunk_id,
            ChunkResult {
                category_name: category.to_string(),
                category_description: format!("{} (from chunk {})", category, chunk_id),
                records: names.iter().map(|n| record(n)).collect(),
            },
            1,
        )
    }

    fn snapshot(total_chunks: usize, entries: Vec<CheckpointEntry>) -> CheckpointSnapshot {
        CheckpointSnapshot {
            total_chunks,
            entries: entries.into_iter().map(|e| (e.chunk_id, e)).collect(),
        }
    }

    #[test]
    fn test_shared_category_concatenates_in_chunk_order() {
        // Inserted out of order to mimic arrival order.
        let snap = snapshot(
            2,
            vec![
                succeeded(1, "Repos", &["d", "e"]),
                succeeded(0, "Repos", &["a", "b", "c"]),
            ],
        );

        let merged = Merger::default().merge(&snap);
        let repos = merged.category("Repos").unwrap();
        let names: Vec<&str> = repos.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(repos.description, "Repos (from chunk 0)");
    }

    #[test]
    fn test_skips_failed_and_counts_records() {
        let failed_chunk = Chunk {
            chunk_id: 1,
            category_name: "Users".to_string(),
            category_description: String::new(),
            category_index: 1,
            endpoints: vec![],
            total_chunks: 3,
        };
        let snap = snapshot(
            3,
            vec![
                succeeded(0, "Repos", &["a", "b"]),
                CheckpointEntry::failed(&failed_chunk, 2, "timeout".to_string()),
                succeeded(2, "Orgs", &["x"]),
            ],
        );

        let merged = Merger::default().merge(&snap);
        assert_eq!(merged.total_records(), snap.succeeded_record_count());
        let names: Vec<&str> = merged.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Repos", "Orgs"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let snap = snapshot(
            3,
            vec![
                succeeded(2, "Users", &["u1"]),
                succeeded(0, "Repos", &["a"]),
                succeeded(1, "Repos", &["b"]),
            ],
        );
        let merger = Merger::default();
        let first = serde_json::to_string(&merger.merge(&snap)).unwrap();
        let second = serde_json::to_string(&merger.merge(&snap)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_canonicalization_toggle() {
        let snap = snapshot(
            2,
            vec![
                succeeded(0, "Pull Requests", &["a"]),
                succeeded(1, " pull  requests ", &["b"]),
            ],
        );

        let merged = Merger::new(true).merge(&snap);
        assert_eq!(merged.categories.len(), 1);
        assert_eq!(merged.categories[0].name, "Pull Requests");
        assert_eq!(merged.total_records(), 2);

        let raw = Merger::new(false).merge(&snap);
        assert_eq!(raw.categories.len(), 2);
    }

    #[test]
    fn test_canonical_category_name() {
        assert_eq!(canonical_category_name("  Git   Data\t"), "git data");
    }
}
