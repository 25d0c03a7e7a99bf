// src/lib.rs
pub mod types;
pub mod error;
pub mod textio;
pub mod taxdb;
pub mod lineage;
pub mod lca;
pub mod score;
pub mod kraken_out;
pub mod config;
pub mod batch;
pub mod pairs;

pub use crate::batch::{run_batch, BatchEvent, BatchReport, BatchScheduler, CancelToken};
pub use crate::config::{BatchConfig, JobSource, ScoringParams};
pub use crate::error::{BatchError, ConfigError, JobError, TaxonomyError};
pub use crate::lca::{lca, LcaEngine};
pub use crate::lineage::{format_lineage, lineage, lineage_iter};
pub use crate::pairs::{score_pairs, PairsSummary};
pub use crate::score::{EntropyScorer, Prediction, PredictionCache};
pub use crate::taxdb::TaxonomyGraph;
pub use crate::types::{Job, JobResult, JobStatus, LcaGeometry, PredictionScore, TaxId};
