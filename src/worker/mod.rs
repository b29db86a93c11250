// file: src/worker/mod.rs
// description: worker invocation interface injected into the dispatcher
// reference: opaque call contract, chunk in and raw payload out

mod chat;
mod mock;
mod prompt;

pub use chat::ChatCompletionWorker;
pub use mock::{MockCall, MockResponse, MockWorker};
pub use prompt::{payload_schema, render_prompt, SYSTEM_PROMPT};

use crate::error::Result;
use crate::models::Chunk;
use async_trait::async_trait;

/// Knobs the dispatcher hands to each invocation. Retries lower the
/// temperature to reduce output variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvocationParams {
    pub temperature: f32,
    pub attempt: u32,
}

impl InvocationParams {
    pub fn new(temperature: f32) -> Self {
        Self {
            temperature,
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// An unreliable, latency-bound unit of computation turning a chunk into
/// raw structured text. Failures and slow calls are expected.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn invoke(&self, chunk: &Chunk, params: &InvocationParams) -> Result<String>;
}
