// src/score/score_cache.rs

use ahash::AHashMap;

use super::{EntropyScorer, Prediction};
use crate::types::{PredictionScore, TaxId};

/// Per-job memo of predicted taxid -> score.
///
/// The true taxon is fixed for a job, so the score is a pure function of the
/// predicted taxid. Sized by distinct predictions, not by reads.
pub struct PredictionCache<'a> {
    scorer: EntropyScorer<'a>,
    entries: AHashMap<TaxId, PredictionScore>,
    hits: u64,
}

impl<'a> PredictionCache<'a> {
    pub fn new(scorer: EntropyScorer<'a>) -> Self {
        Self {
            scorer,
            entries: AHashMap::new(),
            hits: 0,
        }
    }

    /// Score for `pred_taxid`, computed on its first occurrence only.
    /// Taxid 0 is the unclassified sentinel.
    pub fn get_or_compute(&mut self, pred_taxid: TaxId) -> &PredictionScore {
        if self.entries.contains_key(&pred_taxid) {
            self.hits += 1;
        }
        let scorer = &self.scorer;
        self.entries
            .entry(pred_taxid)
            .or_insert_with(|| scorer.score(Prediction::from_taxid(pred_taxid)))
    }

    /// Number of distinct predictions seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
