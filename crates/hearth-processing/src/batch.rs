//! Batch orchestration.
//!
//! Items run on the blocking pool with at most `max_concurrency` in flight. A slot is held
//! by the blocking work itself, so a timed-out item keeps its slot until it really stops.
//! Results come back through one collector loop, which is the only place progress is
//! updated and the only caller of the progress callback.

use futures::stream::{self, StreamExt};
use hearth_core::{BatchProgress, JobStatus, MediaAsset, PipelineConfig, ProcessingJob};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::pipeline::MediaPipeline;

#[derive(Clone)]
pub struct BatchCoordinator {
    pipeline: Arc<MediaPipeline>,
    max_concurrency: usize,
    item_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(pipeline: Arc<MediaPipeline>) -> Self {
        Self {
            pipeline,
            max_concurrency: PipelineConfig::default().max_concurrency,
            item_timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(pipeline: Arc<MediaPipeline>, config: &PipelineConfig) -> Self {
        Self::new(pipeline)
            .with_max_concurrency(config.max_concurrency)
            .with_item_timeout(config.item_timeout)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the batch from starting further items when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process `assets` and report progress once per item.
    ///
    /// Never fails as a whole: every item ends up as a job in the result, in input order.
    #[tracing::instrument(skip(self, assets, on_progress), fields(total = assets.len()))]
    pub async fn process_batch<F>(&self, assets: Vec<MediaAsset>, mut on_progress: F) -> BatchResult
    where
        F: FnMut(&BatchProgress),
    {
        let start = Instant::now();
        let total = assets.len();
        let mut progress = BatchProgress::new(total);
        let mut slots: Vec<Option<ProcessingJob>> = (0..total).map(|_| None).collect();

        let pipeline = Arc::clone(&self.pipeline);
        let cancel = self.cancel.clone();
        let item_timeout = self.item_timeout;
        let slots_in_use = Arc::new(Semaphore::new(self.max_concurrency));

        let mut results = stream::iter(assets.into_iter().enumerate())
            .map(move |(index, asset)| {
                run_item(
                    Arc::clone(&pipeline),
                    index,
                    Arc::new(asset),
                    cancel.clone(),
                    Arc::clone(&slots_in_use),
                    item_timeout,
                )
            })
            .buffer_unordered(self.max_concurrency);

        while let Some(job) = results.next().await {
            progress.advance(job.asset.original_filename());
            on_progress(&progress);

            let index = job.index;
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(job);
            }
        }

        let mut jobs: Vec<ProcessingJob> = slots.into_iter().flatten().collect();
        mark_duplicates(&mut jobs);

        let result = BatchResult {
            jobs,
            cancelled: self.cancel.is_cancelled(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        let summary = result.summary();
        tracing::info!(
            total = summary.total,
            completed = summary.completed,
            rejected = summary.rejected,
            failed = summary.failed,
            timed_out = summary.timed_out,
            cancelled = summary.cancelled,
            duplicates = summary.duplicates,
            elapsed_ms = result.elapsed_ms,
            "Batch finished"
        );

        result
    }
}

async fn run_item(
    pipeline: Arc<MediaPipeline>,
    index: usize,
    asset: Arc<MediaAsset>,
    cancel: CancellationToken,
    slots: Arc<Semaphore>,
    item_timeout: Option<Duration>,
) -> ProcessingJob {
    // Cancellation is checked once a slot is held; items still queued are skipped.
    let permit = match slots.acquire_owned().await {
        Ok(permit) if !cancel.is_cancelled() => permit,
        _ => {
            tracing::debug!(index = index, "Batch cancelled, skipping item");
            let mut job = ProcessingJob::new(index, asset);
            job.finish(JobStatus::Cancelled);
            return job;
        }
    };

    let worker_asset = Arc::clone(&asset);
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.process(index, worker_asset)
    });

    let joined = match item_timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                // The blocking task keeps running and holds its slot; its result is discarded.
                let after_ms = limit.as_millis() as u64;
                tracing::warn!(
                    index = index,
                    filename = %asset.original_filename(),
                    after_ms = after_ms,
                    "Item timed out"
                );
                let mut job = ProcessingJob::new(index, asset);
                job.finish(JobStatus::TimedOut { after_ms });
                return job;
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(
                index = index,
                filename = %asset.original_filename(),
                error = %e,
                "Processing worker crashed"
            );
            let mut job = ProcessingJob::new(index, asset);
            job.finish(JobStatus::Failed {
                reason: format!("worker crashed: {}", e),
            });
            job
        }
    }
}

/// Flag items whose bytes match an earlier item in input order.
fn mark_duplicates(jobs: &mut [ProcessingJob]) {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for job in jobs.iter_mut() {
        if job.asset.is_empty() {
            continue;
        }
        let Some(sum) = job.checksum().map(str::to_string) else {
            continue;
        };
        match first_seen.get(&sum) {
            Some(&original) => {
                job.duplicate_of = Some(original);
                if let Some(validation) = job.validation.as_mut() {
                    validation.warning(format!("Duplicate of item {} in this batch", original));
                }
            }
            None => {
                first_seen.insert(sum, job.index);
            }
        }
    }
}

/// One item that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub filename: String,
    pub reason: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Jobs in input order
    pub jobs: Vec<ProcessingJob>,
    /// Whether cancellation was requested while the batch ran
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl BatchResult {
    pub fn successful(&self) -> Vec<&ProcessingJob> {
        self.jobs.iter().filter(|j| j.status.is_success()).collect()
    }

    pub fn failures(&self) -> Vec<BatchFailure> {
        self.jobs
            .iter()
            .filter_map(|job| {
                job.status.failure_reason().map(|reason| BatchFailure {
                    index: job.index,
                    filename: job.asset.original_filename().to_string(),
                    reason,
                    retryable: job.status.is_retryable(),
                })
            })
            .collect()
    }

    /// Assets worth resubmitting unchanged (failed, timed out or cancelled).
    pub fn retry_candidates(&self) -> Vec<Arc<MediaAsset>> {
        self.jobs
            .iter()
            .filter(|j| j.status.is_retryable())
            .map(|j| Arc::clone(&j.asset))
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in &self.jobs {
            match job.status {
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Rejected { .. } => summary.rejected += 1,
                JobStatus::Failed { .. } | JobStatus::Pending => summary.failed += 1,
                JobStatus::TimedOut { .. } => summary.timed_out += 1,
                JobStatus::Cancelled => summary.cancelled += 1,
            }
            if job.duplicate_of.is_some() {
                summary.duplicates += 1;
            }
        }
        summary
    }
}
