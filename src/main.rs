// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use apidoc_extract::utils::logging::{
    format_error, format_gap, format_info, format_success, format_warning,
};
use apidoc_extract::{
    Catalog, ChatCompletionWorker, CheckpointStore, Config, DispatchStrategy,
    FileCheckpointStore, JsonExporter, Merger, Partitioner, Pipeline, RetrySummary, StatusReport,
};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "apidoc_extract")]
#[command(version)]
#[command(
    about = "Resumable chunked extraction of API endpoint records from documentation catalogs",
    long_about = None
)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition, dispatch, retry and merge; resumes from checkpoints
    Run {
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Discard existing checkpoints and start over
        #[arg(long)]
        fresh: bool,

        #[arg(long)]
        no_retry: bool,

        /// Invoke the worker one chunk at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Show checkpoint progress and unresolved chunks
    Status,

    /// Retry chunks that have no succeeded checkpoint
    Retry {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Merge succeeded checkpoints and write the output document
    Merge {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the chunk layout for a catalog without invoking the worker
    Plan {
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    apidoc_extract::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("API documentation extraction pipeline");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        let mut config = Config::default_config();
        if config.worker.api_key.is_none() {
            config.worker.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        config
    };

    match cli.command {
        Commands::Run {
            catalog,
            fresh,
            no_retry,
            sequential,
        } => {
            cmd_run(config, &catalog, fresh, no_retry, sequential, cli.color).await?;
        }
        Commands::Status => {
            cmd_status(&config)?;
        }
        Commands::Retry { yes } => {
            cmd_retry(config, yes, cli.color).await?;
        }
        Commands::Merge { output, pretty } => {
            cmd_merge(&config, output, pretty)?;
        }
        Commands::Plan { catalog } => {
            cmd_plan(&config, &catalog)?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<FileCheckpointStore>> {
    let store = FileCheckpointStore::new(&config.checkpoint.dir).with_context(|| {
        format!(
            "Failed to open checkpoint directory {}",
            config.checkpoint.dir.display()
        )
    })?;
    Ok(Arc::new(store))
}

fn build_pipeline(config: Config, store: Arc<FileCheckpointStore>, color: bool) -> Result<Pipeline> {
    let worker = ChatCompletionWorker::from_config(&config.worker)
        .context("Failed to configure the extraction worker")?;
    info!("Using model {} at {}", worker.model(), config.worker.base_url);

    Ok(Pipeline::new(config, store, Arc::new(worker))?.with_progress(color))
}

fn output_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("endpoints.json")
        .to_string()
}

async fn cmd_run(
    mut config: Config,
    catalog_path: &Path,
    fresh: bool,
    no_retry: bool,
    sequential: bool,
    color: bool,
) -> Result<()> {
    let catalog = Catalog::from_path(catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;
    info!(
        "Loaded catalog with {} categories and {} endpoints",
        catalog.categories.len(),
        catalog.endpoint_count()
    );

    if no_retry {
        config.pipeline.auto_retry = false;
    }
    let output_path = config.output.path.clone();
    let pretty = config.output.pretty;

    let store = open_store(&config)?;
    let strategy = if sequential {
        DispatchStrategy::Sequential
    } else {
        DispatchStrategy::BoundedPool
    };
    let pipeline = build_pipeline(config, store, color)?.with_strategy(strategy);

    let report = pipeline.run(&catalog, fresh).await?;

    let exporter = JsonExporter::for_output(&output_path, pretty)?;
    exporter.export_run(&report, &output_file_name(&output_path))?;

    if let Some(retry) = &report.retry {
        print_retry_summary(retry);
    }
    print_status(&report.status);
    println!(
        "{}",
        format_success(&format!(
            "Wrote {} records to {}",
            report.merged.total_records(),
            output_path.display()
        ))
    );

    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let Some(plan) = store.load_plan()? else {
        println!(
            "{}",
            format_info("No chunk plan found; start with `run --catalog FILE`")
        );
        return Ok(());
    };

    let snapshot = store.snapshot(plan.total_chunks())?;
    print_status(&StatusReport::from_snapshot(&plan, &snapshot));
    Ok(())
}

async fn cmd_retry(config: Config, yes: bool, color: bool) -> Result<()> {
    let store = open_store(&config)?;
    let Some(plan) = store.load_plan()? else {
        println!(
            "{}",
            format_info("No chunk plan found; start with `run --catalog FILE`")
        );
        return Ok(());
    };

    let snapshot = store.snapshot(plan.total_chunks())?;
    let status = StatusReport::from_snapshot(&plan, &snapshot);
    print_status(&status);

    if status.is_complete() {
        return Ok(());
    }

    if !yes {
        let proceed = Confirm::new()
            .with_prompt(format!("Retry {} unresolved chunks?", status.failed_count))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !proceed {
            info!("Retry cancelled");
            return Ok(());
        }
    }

    let output_path = config.output.path.clone();
    let pretty = config.output.pretty;
    let pipeline = build_pipeline(config, store, color)?;

    let summary = pipeline.retry(&plan).await?;
    print_retry_summary(&summary);

    let (merged, _) = pipeline.merge(&plan)?;
    JsonExporter::for_output(&output_path, pretty)?
        .export_merged(&merged, &output_file_name(&output_path))?;

    Ok(())
}

fn cmd_merge(config: &Config, output: Option<PathBuf>, pretty: bool) -> Result<()> {
    let store = open_store(config)?;
    let plan = store
        .load_plan()?
        .context("No chunk plan found; run the pipeline first")?;

    let snapshot = store.snapshot(plan.total_chunks())?;
    let merged = Merger::new(config.merge.canonicalize_category_names).merge(&snapshot);

    let output_path = output.unwrap_or_else(|| config.output.path.clone());
    let exporter = JsonExporter::for_output(&output_path, pretty || config.output.pretty)?;
    exporter.export_merged(&merged, &output_file_name(&output_path))?;

    let status = StatusReport::from_snapshot(&plan, &snapshot);
    if !status.is_complete() {
        println!(
            "{}",
            format_warning(&format!(
                "Output is partial: {} of {} chunks unresolved",
                status.failed_count, status.total_expected
            ))
        );
    }
    println!(
        "{}",
        format_success(&format!(
            "Merged {} records in {} categories into {}",
            merged.total_records(),
            merged.categories.len(),
            output_path.display()
        ))
    );

    Ok(())
}

fn cmd_plan(config: &Config, catalog_path: &Path) -> Result<()> {
    let catalog = Catalog::from_path(catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;
    let chunks = Partitioner::new(config.pipeline.chunk_size)?.partition(&catalog);

    println!(
        "\n{} endpoints in {} categories -> {} chunks of at most {}\n",
        catalog.endpoint_count(),
        catalog.categories.len(),
        chunks.len(),
        config.pipeline.chunk_size
    );
    for chunk in &chunks {
        println!(
            "  chunk {:>4}  {:<40} {} endpoints",
            chunk.chunk_id,
            chunk.category_name,
            chunk.endpoints.len()
        );
    }
    println!();

    Ok(())
}

fn print_status(status: &StatusReport) {
    println!("\n{}", "=".repeat(60));
    println!("Chunks expected:  {}", status.total_expected);
    println!("Chunks succeeded: {}", status.succeeded);
    println!("Chunks unresolved: {}", status.failed_count);
    println!("Success rate:     {:.2}%", status.success_rate);
    println!("Records:          {}", status.records);

    if status.is_complete() {
        println!("{}", format_success("All chunks succeeded"));
    } else {
        println!("{}", format_warning("Unresolved chunks:"));
        for gap in &status.unresolved {
            println!(
                "{}",
                format_gap(gap.chunk_id, &gap.category_name, &gap.reason, gap.attempts)
            );
        }
    }
    println!("{}\n", "=".repeat(60));
}

fn print_retry_summary(summary: &RetrySummary) {
    println!(
        "{}",
        format_info(&format!(
            "Retry: {} attempted, {} succeeded, {} failed ({:.2}%)",
            summary.attempted,
            summary.succeeded,
            summary.failed,
            summary.success_rate()
        ))
    );
    for exhausted in summary.exhausted() {
        println!("{}", format_error(&exhausted.to_string()));
    }
}
