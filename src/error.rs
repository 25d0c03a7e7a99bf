//src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the node dump. Always fatal to a run.
#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("cannot read taxonomy: {0}")]
    Io(#[from] io::Error),

    #[error("malformed taxonomy line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },

    #[error("no usable taxonomy nodes in {}", path.display())]
    Empty { path: PathBuf },
}

/// Misconfiguration detected before any job runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("either provide a job list or both a key file and a directory to scan")]
    NoJobSource,

    #[error("no jobs found in {}", path.display())]
    EmptyJobList { path: PathBuf },

    #[error("no classifier output files matching *_dbN.out in {} have a key entry", dir.display())]
    NoJobsDiscovered { dir: PathBuf },

    #[error("key file missing required column '{column}'. Found: {found:?}")]
    KeyFileMissingColumn { column: String, found: Vec<String> },

    #[error("none of the columns {expected:?} found. Available columns: {found:?}")]
    MissingColumn { expected: Vec<String>, found: Vec<String> },

    #[error(
        "{} and {} would both write {}",
        first.display(),
        second.display(),
        output.display()
    )]
    DuplicateOutput { output: PathBuf, first: PathBuf, second: PathBuf },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure of a single job. Recorded in the summary, never propagated.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Anything that stops a whole batch run.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error("cannot build worker pool: {0}")]
    Pool(String),

    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}
