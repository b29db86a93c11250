// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub retry: RetryConfig,
    pub worker: WorkerConfig,
    pub checkpoint: CheckpointConfig,
    pub merge: MergeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub max_concurrency: usize,
    pub invocation_timeout_secs: u64,
    pub temperature: f32,
    #[serde(default = "default_auto_retry")]
    pub auto_retry: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub reduced_concurrency: usize,
    pub retry_temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    pub canonicalize_category_names: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub pretty: bool,
}

fn default_auto_retry() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    8192
}

impl PipelineConfig {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("APIDOC_EXTRACT")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if config.worker.api_key.is_none() {
            config.worker.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            pipeline: PipelineConfig {
                chunk_size: 5,
                max_concurrency: 3,
                invocation_timeout_secs: 180,
                temperature: 0.7,
                auto_retry: true,
            },
            retry: RetryConfig {
                max_retries: 2,
                reduced_concurrency: 1,
                retry_temperature: 0.2,
            },
            worker: WorkerConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                max_tokens: default_max_tokens(),
            },
            checkpoint: CheckpointConfig {
                dir: PathBuf::from("checkpoints"),
            },
            merge: MergeConfig {
                canonicalize_category_names: true,
            },
            output: OutputConfig {
                path: PathBuf::from("output/endpoints.json"),
                pretty: true,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_concurrency == 0 {
            return Err(PipelineError::Config(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.invocation_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "invocation_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.retry.reduced_concurrency == 0
            || self.retry.reduced_concurrency > self.pipeline.max_concurrency
        {
            return Err(PipelineError::Config(format!(
                "reduced_concurrency must be between 1 and max_concurrency ({})",
                self.pipeline.max_concurrency
            )));
        }

        for (name, value) in [
            ("temperature", self.pipeline.temperature),
            ("retry_temperature", self.retry.retry_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(PipelineError::Config(format!(
                    "{} must be within [0, 2], got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
