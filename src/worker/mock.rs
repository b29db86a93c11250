// file: src/worker/mock.rs
// description: scripted worker for exercising the pipeline without network calls
// reference: deterministic per-chunk responses with call tracking

use super::{InvocationParams, Worker};
use crate::error::{PipelineError, Result};
use crate::models::Chunk;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock does for one invocation.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this raw payload verbatim.
    Payload(String),
    /// Return a well-formed payload with one record per endpoint.
    Generated,
    /// Fail with an invocation error.
    Fail(String),
    /// Sleep before answering, to trip the dispatcher timeout.
    Hang(Duration),
    Panic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub chunk_id: usize,
    pub temperature: f32,
    pub attempt: u32,
}

/// Chunks without a script (or whose script ran out) get a generated payload.
#[derive(Default)]
pub struct MockWorker {
    scripts: RwLock<HashMap<usize, VecDeque<MockResponse>>>,
    calls: RwLock<Vec<MockCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue responses for successive invocations of one chunk.
    pub fn script(self, chunk_id: usize, responses: Vec<MockResponse>) -> Self {
        self.scripts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chunk_id, responses.into());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls_for(&self, chunk_id: usize) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.chunk_id == chunk_id)
            .collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn generated_payload(chunk: &Chunk) -> String {
        let records: Vec<_> = chunk
            .endpoints
            .iter()
            .enumerate()
            .map(|(idx, endpoint)| {
                json!({
                    "name": endpoint.title,
                    "description": format!("Documented at {}", endpoint.link),
                    "method": "GET",
                    "path": format!("/chunk{}/{}", chunk.chunk_id, idx),
                    "headers": [],
                    "path_params": [],
                    "query_params": [],
                    "body_params": [],
                    "responses": {"200": {"description": "OK"}}
                })
            })
            .collect();

        json!({
            "categories": [{
                "name": chunk.category_name,
                "description": chunk.category_description,
                "records": records
            }]
        })
        .to_string()
    }

    fn next_response(&self, chunk_id: usize) -> MockResponse {
        self.scripts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&chunk_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(MockResponse::Generated)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Worker for MockWorker {
    async fn invoke(&self, chunk: &Chunk, params: &InvocationParams) -> Result<String> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                chunk_id: chunk.chunk_id,
                temperature: params.temperature,
                attempt: params.attempt,
            });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(current, Ordering::SeqCst);

        let response = self.next_response(chunk.chunk_id);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match response {
            MockResponse::Payload(raw) => Ok(raw),
            MockResponse::Generated => Ok(Self::generated_payload(chunk)),
            MockResponse::Fail(reason) => Err(PipelineError::InvocationFailure {
                chunk_id: chunk.chunk_id,
                reason,
            }),
            MockResponse::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Self::generated_payload(chunk))
            }
            MockResponse::Panic => panic!("mock worker panicked on chunk {}", chunk.chunk_id),
        }
    }
}
