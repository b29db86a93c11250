// file: src/models/merged.rs
// description: final merged document grouped by category
// reference: output document shape {categories: [{name, description, records}]}

use super::record::ExtractionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCategory {
    pub name: String,
    pub description: String,
    pub records: Vec<ExtractionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedOutput {
    pub categories: Vec<MergedCategory>,
}

impl MergedOutput {
    pub fn total_records(&self) -> usize {
        self.categories.iter().map(|c| c.records.len()).sum()
    }

    pub fn category(&self, name: &str) -> Option<&MergedCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
