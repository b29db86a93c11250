// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod exporter;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod worker;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{
    CheckpointConfig, Config, MergeConfig, OutputConfig, PipelineConfig, RetryConfig,
    WorkerConfig,
};
pub use error::{PipelineError, Result};
pub use exporter::{ExportManifest, JsonExporter};
pub use models::{
    Catalog, Category, CheckpointEntry, CheckpointSnapshot, CheckpointStatus, Chunk, ChunkPlan,
    ChunkResult, EndpointStub, ExtractionRecord, MergedCategory, MergedOutput,
};
pub use pipeline::{
    DispatchStrategy, Dispatcher, Guardrail, Merger, Partitioner, Pipeline, PipelineStats,
    ProgressTracker, RetryCoordinator, RetrySummary, RunReport, StatusReport,
};
pub use worker::{ChatCompletionWorker, InvocationParams, MockWorker, Worker};
