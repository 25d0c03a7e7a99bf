//src/config.rs

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::score::rank_weights::RankWeights;

pub const DEFAULT_ALPHA_UP: f64 = 0.3;
pub const DEFAULT_ALPHA_DOWN: f64 = 1.0;
pub const DEFAULT_COMPRESS_LEVEL: u32 = 3;
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Knobs of the entropy formula.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParams {
    /// Penalty per edge from the true taxon up to the LCA
    pub alpha_up: f64,
    /// Penalty per edge from the LCA down to the prediction
    pub alpha_down: f64,
    /// Entropy given to unclassified reads; `None` leaves them without a value
    pub unclassified_entropy: Option<f64>,
    pub rank_weights: RankWeights,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            alpha_up: DEFAULT_ALPHA_UP,
            alpha_down: DEFAULT_ALPHA_DOWN,
            unclassified_entropy: None,
            rank_weights: RankWeights::default(),
        }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("alpha-up", self.alpha_up), ("alpha-down", self.alpha_down)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidParameter(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if let Some(h) = self.unclassified_entropy {
            if !h.is_finite() {
                return Err(ConfigError::InvalidParameter(format!(
                    "unclassified-entropy must be finite, got {}",
                    h
                )));
            }
        }
        Ok(())
    }
}

/// Where batch jobs come from.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSource {
    /// Two-column TSV: `path<TAB>true_taxid`
    List(PathBuf),
    /// Scan `dir` for `*_dbN.out[.gz]` and look up truth in `key_file`
    Discover {
        key_file: PathBuf,
        dir: PathBuf,
        recursive: bool,
    },
}

impl JobSource {
    /// An explicit list wins; otherwise both key file and directory are required.
    pub fn from_options(
        jobs_tsv: Option<PathBuf>,
        key_file: Option<PathBuf>,
        dir: Option<PathBuf>,
        recursive: bool,
    ) -> Result<Self, ConfigError> {
        match (jobs_tsv, key_file, dir) {
            (Some(list), _, _) => Ok(JobSource::List(list)),
            (None, Some(key_file), Some(dir)) => Ok(JobSource::Discover { key_file, dir, recursive }),
            _ => Err(ConfigError::NoJobSource),
        }
    }
}

/// Everything a batch run needs besides the taxonomy and the job list.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub outdir: PathBuf,
    pub summary_path: PathBuf,
    pub workers: usize,
    pub gzip: bool,
    pub compress_level: u32,
    pub diagnostics: bool,
    pub skip_existing: bool,
    pub scoring: ScoringParams,
}

impl BatchConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(outdir: P, summary_path: Q) -> Self {
        Self {
            outdir: outdir.into(),
            summary_path: summary_path.into(),
            workers: default_workers(),
            gzip: false,
            compress_level: DEFAULT_COMPRESS_LEVEL,
            diagnostics: true,
            skip_existing: false,
            scoring: ScoringParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidParameter("jobs must be at least 1".into()));
        }
        if self.compress_level > 9 {
            return Err(ConfigError::InvalidParameter(format!(
                "compresslevel must be between 0 and 9, got {}",
                self.compress_level
            )));
        }
        self.scoring.validate()
    }

    /// Output path for one input: `<outdir>/<input name>.entropy.tsv[.gz]`.
    pub fn output_path_for(&self, input_name: &str) -> PathBuf {
        let suffix = if self.gzip { ".entropy.tsv.gz" } else { ".entropy.tsv" };
        self.outdir.join(format!("{}{}", input_name, suffix))
    }
}

/// `min(8, available cpus)`, never zero.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)
}
