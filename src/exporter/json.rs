// file: src/exporter/json.rs
// description: json export of the merged document and run reports

use crate::error::Result;
use crate::models::MergedOutput;
use crate::pipeline::RunReport;
use chrono::Utc;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE: &str = "run_report.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
    pretty: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_categories: usize,
    pub total_records: usize,
    pub complete: bool,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir, pretty })
    }

    /// Exporter rooted at the parent directory of `output_path`.
    pub fn for_output(output_path: &Path, pretty: bool) -> Result<Self> {
        let dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(dir, pretty)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_merged(&self, merged: &MergedOutput, file_name: &str) -> Result<PathBuf> {
        let path = self.write_json(file_name, merged)?;
        info!(
            "Wrote {} records in {} categories to {}",
            merged.total_records(),
            merged.categories.len(),
            path.display()
        );
        Ok(path)
    }

    /// Writes the merged document, the run report and a manifest listing both.
    pub fn export_run(&self, report: &RunReport, file_name: &str) -> Result<ExportManifest> {
        let merged_path = self.export_merged(&report.merged, file_name)?;
        let report_path = self.write_json(REPORT_FILE, report)?;

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_categories: report.merged.categories.len(),
            total_records: report.merged.total_records(),
            complete: report.status.is_complete(),
            files: [merged_path, report_path]
                .iter()
                .filter_map(|p| p.file_name().and_then(OsStr::to_str))
                .map(str::to_string)
                .collect(),
        };
        self.write_json(MANIFEST_FILE, &manifest)?;

        info!("Export complete: {} files generated", manifest.files.len());
        Ok(manifest)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let body = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(&path, body)?;
        Ok(path)
    }
}
