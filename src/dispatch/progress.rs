// src/dispatch/progress.rs - Progress reporting for batched enrichment runs

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Called after every completed batch, successful or not.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }
}

/// `remaining / (processed / elapsed)`. `None` until something has been
/// processed and some time has passed.
pub fn estimate_remaining(processed: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if processed == 0 || elapsed.is_zero() {
        return None;
    }
    let remaining = total.saturating_sub(processed) as f64;
    let rate = processed as f64 / elapsed.as_secs_f64();
    Some(Duration::from_secs_f64(remaining / rate))
}

/// Human form of an ETA: whole minutes above one minute, otherwise seconds,
/// both rounded up.
pub fn format_eta(eta: Duration) -> String {
    let ms = eta.as_millis();
    if ms > 60_000 {
        format!("{} mins remaining", (ms + 59_999) / 60_000)
    } else {
        format!("{} secs remaining", (ms + 999) / 1_000)
    }
}

/// Running count of items whose batch has finished.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    processed: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count `items` as done and return the resulting snapshot.
    pub fn record(&self, items: usize) -> ProgressSnapshot {
        let processed = (self.processed.fetch_add(items, Ordering::SeqCst) + items).min(self.total);
        let elapsed = self.start_time.elapsed();
        ProgressSnapshot {
            processed,
            total: self.total,
            elapsed,
            eta: estimate_remaining(processed, self.total, elapsed),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst).min(self.total)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Progress callback that drives an indicatif bar.
pub fn progress_bar_callback(pb: ProgressBar) -> ProgressCallback {
    Arc::new(move |snapshot: ProgressSnapshot| {
        pb.set_length(snapshot.total as u64);
        pb.set_position(snapshot.processed as u64);
        if let Some(eta) = snapshot.eta {
            pb.set_message(format_eta(eta));
        }
        if snapshot.is_complete() {
            pb.finish_with_message("done");
        }
    })
}

/// Progress callback that only logs.
pub fn logging_callback(label: &'static str) -> ProgressCallback {
    Arc::new(move |snapshot: ProgressSnapshot| {
        debug!(
            "{}: {}/{} items ({:.1}%){}",
            label,
            snapshot.processed,
            snapshot.total,
            snapshot.percent(),
            snapshot
                .eta
                .map(|eta| format!(", {}", format_eta(eta)))
                .unwrap_or_default()
        );
    })
}

pub fn new_item_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.blue} [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(0, 10, Duration::from_secs(5)), None);
        assert_eq!(estimate_remaining(5, 10, Duration::ZERO), None);
        // 5 items in 10s -> 0.5 items/s -> 5 remaining take 10s
        assert_eq!(
            estimate_remaining(5, 10, Duration::from_secs(10)),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            estimate_remaining(10, 10, Duration::from_secs(3)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::from_millis(1)), "1 secs remaining");
        assert_eq!(format_eta(Duration::from_secs(60)), "60 secs remaining");
        assert_eq!(format_eta(Duration::from_secs(61)), "2 mins remaining");
        assert_eq!(format_eta(Duration::from_secs(600)), "10 mins remaining");
    }

    #[test]
    fn test_tracker_counts_and_caps() {
        let tracker = ProgressTracker::new(5);
        assert_eq!(tracker.record(3).processed, 3);
        let snap = tracker.record(3);
        assert_eq!(snap.processed, 5);
        assert!(snap.is_complete());
        assert_eq!(tracker.processed(), 5);
    }

    #[test]
    fn test_snapshot_percent() {
        let snap = ProgressSnapshot {
            processed: 1,
            total: 4,
            elapsed: Duration::from_secs(1),
            eta: None,
        };
        assert_eq!(snap.percent(), 25.0);
    }
}
