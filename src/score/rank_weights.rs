// src/score/rank_weights.rs

use ahash::AHashMap;

/// Weight for ranks absent from the table (unranked, clade, odd NCBI ranks).
pub const DEFAULT_FALLBACK_RANK_WEIGHT: f64 = 0.50;

/// Default `(rank, weight)` pairs: coarser ranks weigh more.
pub const DEFAULT_RANK_WEIGHTS: &[(&str, f64)] = &[
    // at or below species
    ("subspecies", 0.15),
    ("forma", 0.15),
    ("varietas", 0.15),
    ("species", 0.20),
    ("genus", 0.30),
    ("family", 0.40),
    ("order", 0.50),
    ("class", 0.60),
    ("phylum", 0.80),
    // plants and fungi
    ("division", 0.80),
    ("kingdom", 1.00),
    ("superkingdom", 1.00),
];

/// Rank name -> weight in `[0, 1]`, with a fallback for unknown ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct RankWeights {
    weights: AHashMap<String, f64>,
    fallback: f64,
}

impl RankWeights {
    pub fn new<I, S>(weights: I, fallback: f64) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            weights: weights.into_iter().map(|(r, w)| (r.into(), w)).collect(),
            fallback,
        }
    }

    pub fn weight(&self, rank: &str) -> f64 {
        self.weights.get(rank).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }
}

impl Default for RankWeights {
    fn default() -> Self {
        Self::new(DEFAULT_RANK_WEIGHTS.iter().copied(), DEFAULT_FALLBACK_RANK_WEIGHT)
    }
}
