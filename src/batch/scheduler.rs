// src/batch/scheduler.rs

use crossbeam::channel;
use log::{debug, warn};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::worker::process_job;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::taxdb::TaxonomyGraph;
use crate::types::{Job, JobResult, JobStatus};

/// Shared stop flag. Jobs already running finish their file; jobs not yet
/// started are abandoned and do not appear in the results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fans jobs out over a fixed pool of workers sharing one read-only taxonomy.
///
/// Workers pull `Job`s from a queue and push `JobResult`s back on a result
/// channel; per-job state (cache, counters) never leaves the worker.
pub struct BatchScheduler {
    graph: Arc<TaxonomyGraph>,
    config: Arc<BatchConfig>,
    cancel: CancelToken,
}

impl BatchScheduler {
    pub fn new(graph: Arc<TaxonomyGraph>, config: BatchConfig) -> Self {
        Self {
            graph,
            config: Arc::new(config),
            cancel: CancelToken::new(),
        }
    }

    /// Share an externally owned stop flag instead of the scheduler's own.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every job and return one result per job that was started, in
    /// submission order. `on_result` sees results as they complete.
    pub fn run<F>(&self, jobs: Vec<Job>, mut on_result: F) -> Result<Vec<JobResult>, BatchError>
    where
        F: FnMut(&JobResult),
    {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let n_jobs = jobs.len();
        let n_workers = self.config.workers.clamp(1, n_jobs);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .thread_name(|i| format!("taxentropy-worker-{}", i))
            .build()
            .map_err(|e| BatchError::Pool(e.to_string()))?;

        let (job_tx, job_rx) = channel::unbounded::<(usize, Job)>();
        for (idx, job) in jobs.into_iter().enumerate() {
            if job_tx.send((idx, job)).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (res_tx, res_rx) = channel::unbounded::<(usize, JobResult)>();
        for _ in 0..n_workers {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            let graph = Arc::clone(&self.graph);
            let config = Arc::clone(&self.config);
            let cancel = self.cancel.clone();

            pool.spawn(move || {
                for (idx, job) in job_rx.iter() {
                    if cancel.is_cancelled() {
                        debug!("Abandoning {} after cancellation", job.path.display());
                        continue;
                    }
                    let result = run_isolated(&job, || process_job(&graph, &job, &config));
                    if res_tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(res_tx);
        drop(job_rx);

        let mut results = Vec::with_capacity(n_jobs);
        for (idx, result) in res_rx.iter() {
            if let JobStatus::Error(msg) = &result.status {
                warn!("Job {} failed: {}", result.job.path.display(), msg);
            } else {
                debug!("Job {} finished: {}", result.job.path.display(), result.status);
            }
            on_result(&result);
            results.push((idx, result));
        }

        results.sort_by_key(|(idx, _)| *idx);
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }
}

/// Run one job's work, turning a panic into an error result for that job only.
fn run_isolated<F>(job: &Job, work: F) -> JobResult
where
    F: FnOnce() -> JobResult,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => JobResult {
            job: job.clone(),
            status: JobStatus::Error(format!("panic: {}", panic_message(payload.as_ref()))),
            n_reads: 0,
            n_valid: 0,
            mean_entropy: None,
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
