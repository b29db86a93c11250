// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for pipeline execution
// reference: uses indicatif for progress bars and tracks chunk outcomes

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub chunks_dispatched: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub records_extracted: usize,
    pub duration_secs: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.chunks_dispatched as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.chunks_succeeded + self.chunks_failed;
        if total == 0 {
            return 0.0;
        }
        (self.chunks_succeeded as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    chunks_succeeded: Arc<AtomicUsize>,
    chunks_failed: Arc<AtomicUsize>,
    records_extracted: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn with_color(total_chunks: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        Self::build(multi_progress, total_chunks, colored)
    }

    /// Tracks counts without drawing anything.
    pub fn hidden(total_chunks: usize) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        Self::build(multi_progress, total_chunks, false)
    }

    fn build(multi_progress: MultiProgress, total_chunks: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_chunks as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            chunks_succeeded: Arc::new(AtomicUsize::new(0)),
            chunks_failed: Arc::new(AtomicUsize::new(0)),
            records_extracted: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Starts a new pass (first pass or a retry round) over `total` chunks.
    pub fn reset_pass(&self, total: usize, label: &str) {
        self.main_bar.set_length(total as u64);
        self.main_bar.set_position(0);
        self.main_bar.set_message(label.to_string());
    }

    pub fn inc_chunk_succeeded(&self, records: usize) {
        self.chunks_succeeded.fetch_add(1, Ordering::SeqCst);
        self.records_extracted.fetch_add(records, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_chunk_failed(&self) {
        self.chunks_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Extraction complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> PipelineStats {
        let succeeded = self.chunks_succeeded.load(Ordering::SeqCst);
        let failed = self.chunks_failed.load(Ordering::SeqCst);

        PipelineStats {
            chunks_dispatched: succeeded + failed,
            chunks_succeeded: succeeded,
            chunks_failed: failed,
            records_extracted: self.records_extracted.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let records = self.records_extracted.load(Ordering::SeqCst);
        let failed = self.chunks_failed.load(Ordering::SeqCst);

        let message = format!("Records: {} | Failed chunks: {}", records, failed);

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let template = if colored {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta}) {msg}"
    } else {
        "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} chunks ({eta}) {msg}"
    };

    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars(if colored { "█▓▒░" } else { "=>-" }));
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    if let Ok(style) = ProgressStyle::default_bar().template("{msg}") {
        bar.set_style(style);
    }
    bar
}
