// file: src/checkpoint/file.rs
// description: filesystem checkpoint store, one json file per chunk
// reference: chunk_NNNN.json files written via temp file and rename

use super::CheckpointStore;
use crate::error::{PipelineError, Result};
use crate::models::{CheckpointEntry, ChunkPlan};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PLAN_FILE: &str = "plan.json";

pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PipelineError::Checkpoint {
            path: dir.clone(),
            source,
        })?;
        debug!("Checkpoint store at {}", dir.display());
        Ok(Self { dir })
    }

    fn entry_path(&self, chunk_id: usize) -> PathBuf {
        self.dir.join(format!("chunk_{:04}.json", chunk_id))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = self.dir.join(format!(".{}.tmp", file_name));

        fs::write(&tmp, contents).map_err(|source| PipelineError::Checkpoint {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| PipelineError::Checkpoint {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PipelineError::Checkpoint {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn put(&self, entry: &CheckpointEntry) -> Result<()> {
        let contents = serde_json::to_vec_pretty(entry)?;
        self.write_atomic(&self.entry_path(entry.chunk_id), &contents)?;
        debug!(
            "Checkpointed chunk {} as {} (attempt {})",
            entry.chunk_id,
            entry.status.as_str(),
            entry.attempt_count
        );
        Ok(())
    }

    fn get(&self, chunk_id: usize) -> Result<Option<CheckpointEntry>> {
        let path = self.entry_path(chunk_id);
        let Some(contents) = self.read_optional(&path)? else {
            return Ok(None);
        };

        // An unreadable entry is treated as a gap so the chunk gets retried.
        match serde_json::from_str::<CheckpointEntry>(&contents) {
            Ok(entry) if entry.chunk_id == chunk_id => Ok(Some(entry)),
            Ok(entry) => {
                warn!(
                    "Checkpoint {} holds chunk id {}, ignoring",
                    path.display(),
                    entry.chunk_id
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Corrupt checkpoint {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn save_plan(&self, plan: &ChunkPlan) -> Result<()> {
        let contents = serde_json::to_vec_pretty(plan)?;
        self.write_atomic(&self.dir.join(PLAN_FILE), &contents)?;
        info!(
            "Saved chunk plan with {} chunks to {}",
            plan.total_chunks(),
            self.dir.display()
        );
        Ok(())
    }

    fn load_plan(&self) -> Result<Option<ChunkPlan>> {
        let path = self.dir.join(PLAN_FILE);
        match self.read_optional(&path)? {
            Some(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|source| PipelineError::Checkpoint {
            path: self.dir.clone(),
            source,
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let ours = name == PLAN_FILE || (name.starts_with("chunk_") && name.ends_with(".json"));
            if ours && path.is_file() {
                fs::remove_file(&path)
                    .map_err(|source| PipelineError::Checkpoint { path, source })?;
                removed += 1;
            }
        }

        info!("Cleared {} checkpoint files from {}", removed, self.dir.display());
        Ok(())
    }
}
