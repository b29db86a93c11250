// file: src/models/record.rs
// description: validated extraction records and per-chunk results
// reference: structural contract enforced by the guardrail

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: Option<serde_json::Value>,
}

/// One endpoint as described by the worker. Deserialization tolerates
/// absent collections; the guardrail rejects them before this is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionRecord {
    pub name: String,
    pub description: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Vec<Parameter>,
    #[serde(default)]
    pub path_params: Vec<Parameter>,
    #[serde(default)]
    pub query_params: Vec<Parameter>,
    #[serde(default)]
    pub body_params: Vec<Parameter>,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub category_name: String,
    pub category_description: String,
    pub records: Vec<ExtractionRecord>,
}

/// Shape the worker is asked to return; used to render the schema in prompts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerPayload {
    pub categories: Vec<PayloadCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PayloadCategory {
    pub name: String,
    pub description: String,
    pub records: Vec<ExtractionRecord>,
}
