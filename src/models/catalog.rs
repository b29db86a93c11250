// file: src/models/catalog.rs
// description: endpoint catalog produced by the upstream discovery step
// reference: input document shape {categories: [{name, description, endpoints}]}

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStub {
    pub title: String,
    pub link: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointStub>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::Catalog(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
            .map_err(|e| PipelineError::Catalog(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| PipelineError::Catalog(e.to_string()))
    }

    pub fn endpoint_count(&self) -> usize {
        self.categories.iter().map(|c| c.endpoints.len()).sum()
    }

    /// SHA-256 over every name, description and endpoint; ties a checkpoint
    /// directory to one input.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for category in &self.categories {
            hasher.update(category.name.as_bytes());
            hasher.update([0]);
            hasher.update(category.description.as_bytes());
            hasher.update([0]);
            for endpoint in &category.endpoints {
                hasher.update(endpoint.title.as_bytes());
                hasher.update([0]);
                hasher.update(endpoint.link.as_str().as_bytes());
                hasher.update([0]);
            }
            hasher.update([1]);
        }
        format!("{:x}", hasher.finalize())
    }
}
