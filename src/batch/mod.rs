pub mod jobs;
pub mod scheduler;
pub mod summary;
pub mod worker;

use ahash::AHashMap;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{BatchConfig, JobSource};
use crate::error::{BatchError, ConfigError};
use crate::taxdb::TaxonomyGraph;
use crate::types::{Job, JobResult, JobStatus};

pub use jobs::{discover_jobs, parse_output_name, read_job_list, KeyMap, OutputName};
pub use scheduler::{BatchScheduler, CancelToken};
pub use summary::{write_missing_keys, write_summary, MISSING_KEY_FILE, SUMMARY_HEADER};
pub use worker::process_job;

/// Progress notifications from `run_batch`.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// Jobs resolved; about to load the taxonomy and start workers
    Planned { jobs: usize, missing_key: usize },
    JobFinished(&'a JobResult),
}

/// What a finished batch produced.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub missing_key: Vec<PathBuf>,
    pub summary_path: PathBuf,
}

impl BatchReport {
    pub fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Turn a job source into concrete jobs plus files lacking a key entry.
///
/// Outputs are named after the input file name only, so two jobs whose
/// inputs share a name (same file listed twice, or equal names in different
/// subdirectories of a recursive scan) are rejected here.
pub fn resolve_jobs(source: &JobSource, config: &BatchConfig) -> Result<(Vec<Job>, Vec<PathBuf>), ConfigError> {
    let (jobs, missing_key) = match source {
        JobSource::List(path) => (read_job_list(path, config)?, Vec::new()),
        JobSource::Discover { key_file, dir, recursive } => {
            let keys = KeyMap::load(key_file)?;
            info!("Loaded {} key entries from {}", keys.len(), key_file.display());
            discover_jobs(dir, &keys, *recursive, config)?
        }
    };
    check_unique_outputs(&jobs)?;
    Ok((jobs, missing_key))
}

fn check_unique_outputs(jobs: &[Job]) -> Result<(), ConfigError> {
    let mut owners: AHashMap<&Path, &Path> = AHashMap::with_capacity(jobs.len());
    for job in jobs {
        if let Some(first) = owners.insert(job.out_path.as_path(), job.path.as_path()) {
            return Err(ConfigError::DuplicateOutput {
                output: job.out_path.clone(),
                first: first.to_path_buf(),
                second: job.path.clone(),
            });
        }
    }
    Ok(())
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Write { path: path.to_path_buf(), source }
}

/// Whole batch pipeline:
///  1) validate configuration and resolve the job list (fatal errors surface here)
///  2) load the taxonomy once, shared read-only by every worker
///  3) score all jobs in parallel, isolating per-job failures
///  4) write the summary and, in discovery mode, the missing-key list
pub fn run_batch<F>(
    nodes_dmp: &Path,
    strict_taxonomy: bool,
    source: &JobSource,
    config: BatchConfig,
    cancel: CancelToken,
    mut on_event: F,
) -> Result<BatchReport, BatchError>
where
    F: FnMut(BatchEvent<'_>),
{
    config.validate()?;
    let (jobs, missing_key) = resolve_jobs(source, &config)?;
    fs::create_dir_all(&config.outdir).map_err(write_err(&config.outdir))?;
    on_event(BatchEvent::Planned { jobs: jobs.len(), missing_key: missing_key.len() });

    let graph = Arc::new(TaxonomyGraph::load(nodes_dmp, strict_taxonomy)?);

    let summary_path = config.summary_path.clone();
    let outdir = config.outdir.clone();
    let scheduler = BatchScheduler::new(graph, config).with_cancel_token(cancel);
    let results = scheduler.run(jobs, |r| on_event(BatchEvent::JobFinished(r)))?;

    write_summary(&summary_path, &results).map_err(write_err(&summary_path))?;
    if !missing_key.is_empty() {
        let path = write_missing_keys(&outdir, &missing_key).map_err(write_err(&outdir))?;
        info!("Wrote {} missing-key path(s) to {}", missing_key.len(), path.display());
    }

    let report = BatchReport { results, missing_key, summary_path };
    info!(
        "Batch done: {} ok, {} skipped, {} failed; summary in {}",
        report.count(|s| *s == JobStatus::Ok),
        report.count(|s| *s == JobStatus::SkippedExisting),
        report.count(|s| matches!(s, JobStatus::Error(_))),
        report.summary_path.display()
    );
    Ok(report)
}
