// src/score/score_pair.rs

use crate::config::ScoringParams;
use crate::lca::LcaEngine;
use crate::score::Prediction;
use crate::taxdb::TaxonomyGraph;
use crate::types::{LcaGeometry, PredictionScore, TaxId};

/// Weighted entropy of a mismatch described by `geo`:
///
/// ```text
/// H = R(rank(L)) * log2(1 + k_L) * (alpha_up * u + alpha_down * d)
/// ```
///
/// A childless LCA would zero the branch term, so it counts as `1.0`
/// and the score falls back to rank weight times path penalty.
pub fn entropy_from_geometry(geo: &LcaGeometry, params: &ScoringParams) -> f64 {
    let mut branch_entropy = (1.0 + geo.child_count as f64).log2();
    if branch_entropy == 0.0 {
        branch_entropy = 1.0;
    }
    let rank_weight = params.rank_weights.weight(&geo.rank);
    let path_penalty = params.alpha_up * geo.up as f64 + params.alpha_down * geo.down as f64;

    rank_weight * branch_entropy * path_penalty
}

/// Scores predictions against one fixed true taxon.
pub struct EntropyScorer<'a> {
    engine: Option<LcaEngine<'a>>,
    params: &'a ScoringParams,
}

impl<'a> EntropyScorer<'a> {
    /// `true_taxid` is `None` when the truth could not be parsed; every
    /// classified prediction then scores as "no value".
    pub fn new(graph: &'a TaxonomyGraph, true_taxid: Option<TaxId>, params: &'a ScoringParams) -> Self {
        Self {
            engine: true_taxid.and_then(|t| LcaEngine::new(graph, t)),
            params,
        }
    }

    pub fn score(&self, pred: Prediction) -> PredictionScore {
        let pred_taxid = match pred {
            Prediction::Unclassified => {
                return PredictionScore { entropy: self.params.unclassified_entropy, lca: None };
            }
            Prediction::Unparseable => return PredictionScore { entropy: None, lca: None },
            Prediction::Taxon(t) => t,
        };

        let Some(engine) = &self.engine else {
            return PredictionScore { entropy: None, lca: None };
        };
        let Some(geo) = engine.geometry(pred_taxid) else {
            return PredictionScore { entropy: None, lca: None };
        };

        let entropy = if pred_taxid == engine.true_taxid() {
            0.0
        } else {
            entropy_from_geometry(&geo, self.params)
        };
        PredictionScore { entropy: Some(entropy), lca: Some(geo) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // root(1) -> A(2, genus, 2 children) -> {B(3), C(4)}
    fn graph() -> TaxonomyGraph {
        TaxonomyGraph::from_nodes(vec![
            (1, 1, "no rank"),
            (2, 1, "genus"),
            (3, 2, "species"),
            (4, 2, "species"),
        ])
    }

    #[test]
    fn test_sibling_species() {
        let g = graph();
        let params = ScoringParams::default();
        let scorer = EntropyScorer::new(&g, Some(3), &params);
        let s = scorer.score(Prediction::Taxon(4));

        let geo = s.lca.unwrap();
        assert_eq!(geo.lca, 2);
        assert_eq!((geo.up, geo.down), (1, 1));
        let expected = 0.30 * 3f64.log2() * 1.3;
        assert!((s.entropy.unwrap() - expected).abs() < 1e-12);
        assert!((s.entropy.unwrap() - 0.618).abs() < 1e-3);
    }

    #[test]
    fn test_exact_match_is_zero() {
        let g = graph();
        let params = ScoringParams::default();
        for t in [1, 2, 3, 4] {
            let s = EntropyScorer::new(&g, Some(t), &params).score(Prediction::Taxon(t));
            assert_eq!(s.entropy, Some(0.0));
            assert_eq!(s.lca.unwrap().lca, t);
        }
    }

    #[test]
    fn test_unclassified_uses_configured_value() {
        let g = graph();
        let mut params = ScoringParams::default();
        for true_taxid in [Some(3), Some(999), None] {
            let s = EntropyScorer::new(&g, true_taxid, &params).score(Prediction::Unclassified);
            assert_eq!(s, PredictionScore { entropy: None, lca: None });
        }
        params.unclassified_entropy = Some(5.0);
        for true_taxid in [Some(3), Some(999), None] {
            let s = EntropyScorer::new(&g, true_taxid, &params).score(Prediction::Unclassified);
            assert_eq!(s.entropy, Some(5.0));
            assert!(s.lca.is_none());
        }
    }

    #[test]
    fn test_unknown_taxa_have_no_value() {
        let g = graph();
        let params = ScoringParams { unclassified_entropy: Some(5.0), ..Default::default() };
        let unknown_true = EntropyScorer::new(&g, Some(999), &params);
        assert_eq!(unknown_true.score(Prediction::Taxon(3)).entropy, None);
        assert_eq!(unknown_true.score(Prediction::Taxon(999)).entropy, None);

        let known_true = EntropyScorer::new(&g, Some(3), &params);
        assert_eq!(known_true.score(Prediction::Taxon(999)).entropy, None);
        assert_eq!(known_true.score(Prediction::Unparseable).entropy, None);
    }

    #[test]
    fn test_leaf_lca_uses_unit_branch_entropy() {
        // disjoint-tree fallback onto a leaf true taxon
        let geo = LcaGeometry { lca: 3, up: 0, down: 2, child_count: 0, rank: "species".into() };
        let params = ScoringParams::default();
        let h = entropy_from_geometry(&geo, &params);
        assert!((h - 0.20 * 1.0 * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_alphas_and_fallback_rank() {
        let geo = LcaGeometry { lca: 1, up: 2, down: 3, child_count: 3, rank: "no rank".into() };
        let params = ScoringParams { alpha_up: 0.5, alpha_down: 2.0, ..Default::default() };
        let h = entropy_from_geometry(&geo, &params);
        assert!((h - 0.50 * 2.0 * (0.5 * 2.0 + 2.0 * 3.0)).abs() < 1e-12);
    }
}
