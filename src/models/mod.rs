// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod catalog;
pub mod checkpoint;
pub mod chunk;
pub mod merged;
pub mod record;

pub use catalog::{Catalog, Category, EndpointStub};
pub use checkpoint::{CheckpointEntry, CheckpointSnapshot, CheckpointStatus};
pub use chunk::{Chunk, ChunkPlan};
pub use merged::{MergedCategory, MergedOutput};
pub use record::{
    ChunkResult, ExtractionRecord, Parameter, PayloadCategory, ResponseSpec, WorkerPayload,
};
