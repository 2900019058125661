// src/dispatch/batch.rs
//! Bounded worker pool over a shared batch queue.
//!
//! Items are cut into fixed-size batches, queued, and pulled by exactly
//! `concurrency` workers. Each batch is claimed by one worker under the
//! queue lock. Results are appended as batches finish, so output order is
//! arrival order; only a single worker guarantees input order.

use futures::future::join_all;
use log::{debug, error, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dispatch::progress::{ProgressCallback, ProgressTracker};
use crate::errors::ReconcileError;
use crate::models::stats::DispatchStats;

/// A contiguous slice of the input plus the index of its first item.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTask<T> {
    pub offset: usize,
    pub items: Vec<T>,
}

impl<T> BatchTask<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A batch whose enrichment call failed or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub offset: usize,
    pub len: usize,
    pub error: String,
}

#[derive(Debug)]
pub struct DispatchReport<R> {
    pub results: Vec<R>,
    pub failures: Vec<BatchFailure>,
    pub stats: DispatchStats,
}

#[derive(Clone)]
pub struct BatchDispatcher {
    batch_size: usize,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

/// Split `items` into ordered batches of at most `batch_size`.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> VecDeque<BatchTask<T>> {
    let mut queue = VecDeque::with_capacity(items.len() / batch_size.max(1) + 1);
    let mut offset = 0;
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        let chunk: Vec<T> = iter.by_ref().take(batch_size.max(1)).collect();
        let len = chunk.len();
        queue.push_back(BatchTask {
            offset,
            items: chunk,
        });
        offset += len;
    }
    queue
}

impl BatchDispatcher {
    pub fn new(batch_size: usize, concurrency: usize) -> Result<Self, ReconcileError> {
        if batch_size == 0 {
            return Err(ReconcileError::configuration("batch size must be at least 1"));
        }
        if concurrency == 0 {
            return Err(ReconcileError::configuration("concurrency must be at least 1"));
        }
        Ok(Self {
            batch_size,
            concurrency,
            progress: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `enrich` over every batch of `items`.
    ///
    /// A failed (or panicking) batch is recorded under its starting offset
    /// and `on_failure` supplies the rows emitted in its place; the worker
    /// then moves on to the next batch. The call returns once every batch
    /// has been attempted.
    pub async fn run<T, R, F, Fut, E>(&self, items: Vec<T>, enrich: F, on_failure: E) -> DispatchReport<R>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(BatchTask<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<R>>> + Send + 'static,
        E: Fn(&BatchTask<T>, &anyhow::Error) -> Vec<R> + Send + Sync + 'static,
    {
        let total_items = items.len();
        let queue = partition(items, self.batch_size);
        let total_batches = queue.len();
        info!(
            "Dispatching {} items in {} batches of up to {} with {} workers",
            total_items, total_batches, self.batch_size, self.concurrency
        );

        let queue = Arc::new(Mutex::new(queue));
        let results: Arc<Mutex<Vec<R>>> = Arc::new(Mutex::new(Vec::with_capacity(total_items)));
        let failures: Arc<Mutex<Vec<BatchFailure>>> = Arc::new(Mutex::new(Vec::new()));
        let tracker = Arc::new(ProgressTracker::new(total_items));
        let enrich = Arc::new(enrich);
        let on_failure = Arc::new(on_failure);

        let mut workers = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let failures = Arc::clone(&failures);
            let tracker = Arc::clone(&tracker);
            let enrich = Arc::clone(&enrich);
            let on_failure = Arc::clone(&on_failure);
            let progress = self.progress.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(task) = next else {
                        break;
                    };
                    let offset = task.offset;
                    let len = task.len();
                    debug!("Worker {} claimed batch at offset {} ({} items)", worker_id, offset, len);

                    // spawned so a panicking enrichment only fails its own batch
                    let outcome = match tokio::spawn((enrich)(task.clone())).await {
                        Ok(result) => result,
                        Err(join_err) => Err(anyhow::anyhow!("batch task panicked: {}", join_err)),
                    };

                    let batch_rows = match outcome {
                        Ok(rows) => rows,
                        Err(e) => {
                            error!(
                                "Worker {}: batch starting at row {} failed: {:#}",
                                worker_id,
                                offset + 1,
                                e
                            );
                            failures.lock().await.push(BatchFailure {
                                offset,
                                len,
                                error: format!("{:#}", e),
                            });
                            (on_failure)(&task, &e)
                        }
                    };
                    results.lock().await.extend(batch_rows);

                    let snapshot = tracker.record(len);
                    if let Some(cb) = &progress {
                        cb(snapshot);
                    }
                }
            }));
        }

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!("Dispatch worker failed to join: {:?}", e);
            }
        }

        let results = std::mem::take(&mut *results.lock().await);
        let mut failures = std::mem::take(&mut *failures.lock().await);
        failures.sort_by_key(|f| f.offset);

        let stats = DispatchStats {
            total_items,
            total_batches,
            failed_batches: failures.len(),
            processed_items: tracker.processed(),
            output_rows: results.len(),
            elapsed: tracker.elapsed(),
        };
        info!(
            "Dispatch complete in {:.2?}: {} items, {} batches ({} failed), {} output rows",
            stats.elapsed, stats.total_items, stats.total_batches, stats.failed_batches, stats.output_rows
        );

        DispatchReport {
            results,
            failures,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn no_fallback(_: &BatchTask<usize>, _: &anyhow::Error) -> Vec<usize> {
        Vec::new()
    }

    #[test]
    fn test_partition_offsets() {
        let queue = partition((0..7).collect::<Vec<_>>(), 3);
        let batches: Vec<_> = queue.into_iter().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], BatchTask { offset: 0, items: vec![0, 1, 2] });
        assert_eq!(batches[1].offset, 3);
        assert_eq!(batches[2], BatchTask { offset: 6, items: vec![6] });
        assert!(partition(Vec::<usize>::new(), 3).is_empty());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(BatchDispatcher::new(0, 2).is_err());
        assert!(BatchDispatcher::new(2, 0).is_err());
    }

    #[tokio::test]
    async fn test_single_worker_preserves_input_order() {
        let dispatcher = BatchDispatcher::new(3, 1).unwrap();
        let items: Vec<usize> = (0..10).collect();
        let report = dispatcher
            .run(
                items.clone(),
                |task: BatchTask<usize>| async move {
                    // later batches finish faster; order must still hold
                    tokio::time::sleep(Duration::from_millis(20 - task.offset as u64)).await;
                    Ok::<_, anyhow::Error>(task.items.iter().map(|i| i * 10).collect::<Vec<_>>())
                },
                no_fallback,
            )
            .await;
        assert_eq!(report.results, items.iter().map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(report.stats.total_batches, 4);
        assert_eq!(report.stats.processed_items, 10);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_every_batch_processed_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        let dispatcher = BatchDispatcher::new(4, 3).unwrap();
        let report = dispatcher
            .run(
                (0..50).collect::<Vec<usize>>(),
                move |task: BatchTask<usize>| {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis((task.offset % 7) as u64)).await;
                        Ok::<_, anyhow::Error>(task.items)
                    }
                },
                no_fallback,
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 13);
        let mut got = report.results;
        got.sort_unstable();
        assert_eq!(got, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrent_results_follow_arrival_order() {
        let dispatcher = BatchDispatcher::new(2, 2).unwrap();
        let report = dispatcher
            .run(
                (0..4).collect::<Vec<usize>>(),
                |task: BatchTask<usize>| async move {
                    if task.offset == 0 {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Ok::<_, anyhow::Error>(task.items)
                },
                no_fallback,
            )
            .await;
        // the slow first batch lands after the fast second one
        assert_eq!(report.results, vec![2, 3, 0, 1]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failing_batch_is_isolated_and_marked() {
        let dispatcher = BatchDispatcher::new(2, 3).unwrap();
        let report = dispatcher
            .run(
                (0..10).collect::<Vec<usize>>(),
                |task: BatchTask<usize>| async move {
                    if task.offset == 4 {
                        anyhow::bail!("upstream returned 502");
                    }
                    Ok(task.items.iter().map(|i| format!("ok:{}", i)).collect::<Vec<_>>())
                },
                |task: &BatchTask<usize>, err: &anyhow::Error| {
                    task.items.iter().map(|i| format!("error:{}:{}", i, err)).collect()
                },
            )
            .await;

        assert_eq!(report.results.len(), 10);
        assert_eq!(
            report.failures,
            vec![BatchFailure {
                offset: 4,
                len: 2,
                error: "upstream returned 502".to_string()
            }]
        );
        let mut errored: Vec<&String> = report.results.iter().filter(|r| r.starts_with("error:")).collect();
        errored.sort();
        assert_eq!(
            errored,
            vec!["error:4:upstream returned 502", "error:5:upstream returned 502"]
        );
        assert_eq!(report.stats.failed_batches, 1);
        assert_eq!(report.stats.processed_items, 10);
    }

    #[tokio::test]
    async fn test_panicking_batch_does_not_stop_single_worker() {
        let dispatcher = BatchDispatcher::new(1, 1).unwrap();
        let report = dispatcher
            .run(
                vec![1usize, 2, 3],
                |task: BatchTask<usize>| async move {
                    if task.items[0] == 2 {
                        panic!("boom");
                    }
                    Ok::<_, anyhow::Error>(task.items)
                },
                no_fallback,
            )
            .await;
        assert_eq!(report.results, vec![1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].offset, 1);
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let dispatcher = BatchDispatcher::new(3, 2)
            .unwrap()
            .with_progress(Arc::new(move |snap: crate::dispatch::progress::ProgressSnapshot| {
                seen_in.lock().unwrap().push(snap.processed)
            }));
        dispatcher
            .run(
                (0..8).collect::<Vec<usize>>(),
                |task: BatchTask<usize>| async move { Ok::<_, anyhow::Error>(task.items) },
                no_fallback,
            )
            .await;
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last(), Some(&8));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let dispatcher = BatchDispatcher::new(3, 2).unwrap();
        let report = dispatcher
            .run(
                Vec::<usize>::new(),
                |task: BatchTask<usize>| async move { Ok::<_, anyhow::Error>(task.items) },
                no_fallback,
            )
            .await;
        assert!(report.results.is_empty());
        assert_eq!(report.stats.total_batches, 0);
    }
}
