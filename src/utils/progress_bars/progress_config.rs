// src/utils/progress_bars/progress_config.rs

use indicatif::MultiProgress;
use std::time::Duration;

use crate::dispatch::progress::{
    logging_callback, new_item_bar, progress_bar_callback, ProgressCallback, ProgressSnapshot,
};
use crate::utils::env::env_or;

/// Configuration for progress display during enrichment runs
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to log per-batch progress alongside the bar
    pub detailed: bool,
    /// Spinner tick interval in milliseconds
    pub refresh_rate_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: false,
            refresh_rate_ms: 100,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env_or("PROGRESS_ENABLED", true),
            detailed: env_or("PROGRESS_DETAILED", false),
            refresh_rate_ms: env_or("PROGRESS_REFRESH_RATE_MS", 100),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    /// Dispatcher callback for one stage: an item bar when enabled (attached
    /// to `multi` if given), debug logging otherwise.
    pub fn stage_callback(
        &self,
        label: &'static str,
        total: usize,
        multi: Option<&MultiProgress>,
    ) -> ProgressCallback {
        if !self.enabled {
            return logging_callback(label);
        }
        let pb = new_item_bar(total);
        let pb = match multi {
            Some(mp) => mp.add(pb),
            None => pb,
        };
        pb.enable_steady_tick(Duration::from_millis(self.refresh_rate_ms.max(1)));
        let bar = progress_bar_callback(pb);
        if !self.should_show_detailed() {
            return bar;
        }
        let log = logging_callback(label);
        std::sync::Arc::new(move |snapshot: ProgressSnapshot| {
            log(snapshot.clone());
            bar(snapshot);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(!config.detailed);
        assert_eq!(config.refresh_rate_ms, 100);
    }

    #[test]
    fn test_env_config() {
        env::set_var("PROGRESS_ENABLED", "false");
        env::set_var("PROGRESS_DETAILED", "true");
        env::set_var("PROGRESS_REFRESH_RATE_MS", "50");

        let config = ProgressConfig::from_env();
        assert!(!config.enabled);
        assert!(config.detailed);
        assert_eq!(config.refresh_rate_ms, 50);
        // detailed only counts while bars are enabled
        assert!(!config.should_show_detailed());

        env::remove_var("PROGRESS_ENABLED");
        env::remove_var("PROGRESS_DETAILED");
        env::remove_var("PROGRESS_REFRESH_RATE_MS");
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();
        assert!(config.create_multi_progress().is_some());
        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
    }

    #[test]
    fn test_disabled_callback_accepts_snapshots() {
        let config = ProgressConfig {
            enabled: false,
            ..ProgressConfig::default()
        };
        let cb = config.stage_callback("test", 2, None);
        let tracker = crate::dispatch::progress::ProgressTracker::new(2);
        cb(tracker.record(2));
    }
}
