// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod dispatcher;
pub mod guardrail;
pub mod merger;
pub mod orchestrator;
pub mod partition;
mod progress;
pub mod recorder;
pub mod report;
pub mod retry;

pub use dispatcher::{ChunkOutcome, DispatchStrategy, Dispatcher};
pub use guardrail::Guardrail;
pub use merger::{canonical_category_name, Merger};
pub use orchestrator::Pipeline;
pub use partition::{partition, Partitioner};
pub use progress::{PipelineStats, ProgressTracker};
pub use recorder::{OutcomeRecorder, Recorded};
pub use report::{RunReport, StatusReport, UnresolvedChunk};
pub use retry::{RetryCoordinator, RetryDetail, RetrySummary};
