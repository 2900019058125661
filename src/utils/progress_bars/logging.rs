// src/utils/progress_bars/logging.rs - Logging helpers for pipeline stages
use log::{info, warn};
use std::time::Instant;

use crate::models::stats::DispatchStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Merge,
    Clean,
    Mobile,
    Delivered,
    Courier,
}

impl PipelineStage {
    pub fn label(&self) -> (&'static str, &'static str) {
        match self {
            PipelineStage::Merge => ("MERGE", "🔗"),
            PipelineStage::Clean => ("CLEAN", "🧹"),
            PipelineStage::Mobile => ("MOBILE", "📞"),
            PipelineStage::Delivered => ("DELIVERED", "📦"),
            PipelineStage::Courier => ("COURIER", "🚚"),
        }
    }
}

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (stage_name, stage_emoji) = stage.label();
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str) {
        info!(
            "[{}] {} 🚀 Starting {} stage (run ID: {})",
            self.stage_name,
            self.stage_emoji,
            self.stage_name.to_lowercase(),
            run_id
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.stage_name, self.stage_emoji, count, data_type
        );
    }

    pub fn log_skipped(&self, count: usize, reason: &str) {
        if count > 0 {
            info!(
                "[{}] {} ⏭️  Skipped {} records ({})",
                self.stage_name, self.stage_emoji, count, reason
            );
        }
    }

    pub fn log_dispatch_summary(&self, stats: &DispatchStats) {
        info!(
            "[{}] {} 📈 {} items in {} batches → {} rows",
            self.stage_name, self.stage_emoji, stats.processed_items, stats.total_batches, stats.output_rows
        );
        if stats.failed_batches > 0 {
            warn!(
                "[{}] {} ⚠️  {} of {} batches failed; their items were marked as errors",
                self.stage_name, self.stage_emoji, stats.failed_batches, stats.total_batches
            );
        }
    }

    pub fn log_status_counts(&self, counts: &[(String, usize)]) {
        let summary = counts
            .iter()
            .map(|(status, n)| format!("{}={}", status, n))
            .collect::<Vec<_>>()
            .join(", ");
        info!("[{}] {} 🏷️  Status: {}", self.stage_name, self.stage_emoji, summary);
    }

    pub fn log_success(&self, input_rows: usize, output_rows: usize) {
        info!(
            "[{}] {} ✅ Completed in {:.2?}: {} input rows → {} output rows",
            self.stage_name,
            self.stage_emoji,
            self.start_time.elapsed(),
            input_rows,
            output_rows
        );
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }
}
