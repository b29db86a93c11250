// file: src/pipeline/guardrail.rs
// description: structural validation gate for raw worker payloads
// reference: short-circuit checks, human-readable rejection reasons

use crate::error::{PipelineError, Result};
use crate::models::{Chunk, ChunkResult, ExtractionRecord};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\s*```\s*$")
        .expect("CODE_FENCE regex is valid");
}

const RECORD_KEYS: [&str; 9] = [
    "name",
    "description",
    "method",
    "path",
    "headers",
    "path_params",
    "query_params",
    "body_params",
    "responses",
];

const PARAMETER_COLLECTIONS: [&str; 4] = ["headers", "path_params", "query_params", "body_params"];

const PARAMETER_KEYS: [&str; 4] = ["name", "description", "required", "type"];

const HTTP_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

pub struct Guardrail;

impl Guardrail {
    /// Checks, in order: structured object, non-empty `categories`, at least
    /// one non-empty record list, every record matching the record shape.
    pub fn validate(raw: &str) -> std::result::Result<ChunkResult, String> {
        let payload = Self::parse(raw)?;

        let categories = match payload.get("categories") {
            None => return Err("payload has no \"categories\" key".to_string()),
            Some(Value::Array(items)) if items.is_empty() => {
                return Err("\"categories\" is empty".to_string());
            }
            Some(Value::Array(items)) => items,
            Some(_) => return Err("\"categories\" is not a list".to_string()),
        };

        let mut name = String::new();
        let mut description = String::new();
        let mut raw_records: Vec<(String, usize, &Value)> = Vec::new();

        for (idx, category) in categories.iter().enumerate() {
            let Some(object) = category.as_object() else {
                return Err(format!("category {} is not an object", idx));
            };
            let category_name = object
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            let label = if category_name.is_empty() {
                format!("#{}", idx)
            } else {
                format!("'{}'", category_name)
            };

            let records = match object.get("records").or_else(|| object.get("endpoints")) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(records)) => records,
                Some(_) => return Err(format!("category {} records is not a list", label)),
            };

            if records.is_empty() {
                continue;
            }

            if name.is_empty() {
                name = category_name.clone();
                description = object
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string();
            }

            for (record_idx, record) in records.iter().enumerate() {
                raw_records.push((label.clone(), record_idx, record));
            }
        }

        if raw_records.is_empty() {
            return Err("no category contains any records".to_string());
        }

        let records = raw_records
            .into_iter()
            .map(|(label, idx, value)| Self::check_record(&label, idx, value))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ChunkResult {
            category_name: name,
            category_description: description,
            records,
        })
    }

    /// Like [`Guardrail::validate`], filling a blank category name or
    /// description from the chunk that produced the payload.
    pub fn validate_for_chunk(chunk: &Chunk, raw: &str) -> Result<ChunkResult> {
        let mut result = Self::validate(raw).map_err(|reason| PipelineError::ValidationFailure {
            chunk_id: chunk.chunk_id,
            reason,
        })?;

        if result.category_name.is_empty() {
            result.category_name = chunk.category_name.clone();
        }
        if result.category_description.is_empty() {
            result.category_description = chunk.category_description.clone();
        }

        Ok(result)
    }

    fn parse(raw: &str) -> std::result::Result<Value, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("payload is empty".to_string());
        }

        let body = CODE_FENCE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(trimmed);

        let value: Value = serde_json::from_str(body)
            .map_err(|e| format!("payload is not valid JSON: {}", e))?;

        if !value.is_object() {
            return Err("payload is not a JSON object".to_string());
        }
        Ok(value)
    }

    fn check_record(
        label: &str,
        idx: usize,
        value: &Value,
    ) -> std::result::Result<ExtractionRecord, String> {
        let Some(object) = value.as_object() else {
            return Err(format!("category {} record {}: not an object", label, idx));
        };
        // Every key must be present; empty collections are fine.
        if let Some(key) = RECORD_KEYS.iter().find(|key| !object.contains_key(**key)) {
            return Err(format!(
                "category {} record {}: missing key \"{}\"",
                label, idx, key
            ));
        }
        for collection in PARAMETER_COLLECTIONS {
            let Some(params) = object.get(collection).and_then(Value::as_array) else {
                return Err(format!(
                    "category {} record {}: \"{}\" is not a list",
                    label, idx, collection
                ));
            };
            for (param_idx, param) in params.iter().enumerate() {
                let missing = PARAMETER_KEYS
                    .iter()
                    .find(|key| param.get(**key).is_none());
                if let Some(key) = missing {
                    return Err(format!(
                        "category {} record {}: {}[{}] missing key \"{}\"",
                        label, idx, collection, param_idx, key
                    ));
                }
            }
        }

        let mut record: ExtractionRecord = serde_json::from_value(value.clone())
            .map_err(|e| format!("category {} record {}: {}", label, idx, e))?;

        record.method = record.method.trim().to_uppercase();
        if !HTTP_METHODS.contains(&record.method.as_str()) {
            return Err(format!(
                "category {} record {}: unknown HTTP method {:?}",
                label, idx, record.method
            ));
        }

        if record.path.trim().is_empty() {
            return Err(format!("category {} record {}: path is empty", label, idx));
        }

        Ok(record)
    }
}
