//src/types.rs

use std::path::PathBuf;

/// NCBI taxon identifier.
pub type TaxId = u32;

/// Canonical id written for reads without a usable prediction.
pub const UNCLASSIFIED_TAXID: TaxId = 0;

/// Rank reported for an LCA whose rank is not in the node dump.
pub const NO_RANK: &str = "no_rank";

/// Where the lowest common ancestor of a (true, predicted) pair sits.
///
/// `up` counts edges from the true taxon up to the LCA, `down` counts edges
/// from the LCA down to the predicted taxon.
#[derive(Debug, Clone, PartialEq)]
pub struct LcaGeometry {
    pub lca: TaxId,
    pub up: u32,
    pub down: u32,
    pub child_count: u32,
    pub rank: String,
}

impl LcaGeometry {
    /// Plain edge distance between the two taxa through their LCA.
    pub fn distance(&self) -> u32 {
        self.up + self.down
    }
}

/// Everything known about one predicted taxon within a job.
/// `entropy` is `None` when the score cannot be computed; `lca` is `None`
/// for unclassified or unknown predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionScore {
    pub entropy: Option<f64>,
    pub lca: Option<LcaGeometry>,
}

impl PredictionScore {
    /// `entropy, lca_taxid, lca_rank, up_from_true, down_to_pred, branch_size_LCA`
    /// as tab-separated text, empty fields where there is no value.
    pub fn diagnostic_fields(&self) -> String {
        let entropy = format_opt_f64(self.entropy);
        match &self.lca {
            Some(geo) => format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                entropy, geo.lca, geo.rank, geo.up, geo.down, geo.child_count
            ),
            None => format!("{}\t\t\t\t\t", entropy),
        }
    }
}

/// One line of Kraken-style classifier output, reduced to the fields we need.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRecord {
    pub read_id: String,
    pub pred_taxid: TaxId,
}

/// One unit of batch work: a classifier output file and its ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub path: PathBuf,
    pub dataset: String,
    pub filename: String,
    pub db: String,
    /// Raw true taxid as found in the key file or job list.
    pub true_taxid: String,
    pub out_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Ok,
    SkippedExisting,
    Error(String),
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Ok => f.write_str("ok"),
            JobStatus::SkippedExisting => f.write_str("skipped_existing"),
            JobStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Outcome of one job, as written into the batch summary.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job: Job,
    pub status: JobStatus,
    pub n_reads: u64,
    pub n_valid: u64,
    pub mean_entropy: Option<f64>,
}

/// Render an optional float the way every output file expects it:
/// empty for "no value", shortest round-trip otherwise (`5.0`, `0.618...`).
pub fn format_opt_f64(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", v)).unwrap_or_default()
}
