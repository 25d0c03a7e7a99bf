//src/lca.rs

use ahash::AHashSet;

use crate::lineage::{lineage_iter, Lineage};
use crate::taxdb::TaxonomyGraph;
use crate::types::{LcaGeometry, TaxId, NO_RANK};

/// LCA search anchored on one true taxon.
///
/// The ancestor set of the true taxon is built once, so a job can query many
/// predicted taxa against the same truth without re-walking its lineage.
pub struct LcaEngine<'a> {
    graph: &'a TaxonomyGraph,
    true_taxid: TaxId,
    true_depth: u32,
    ancestors: AHashSet<TaxId>,
}

impl<'a> LcaEngine<'a> {
    /// `None` if `true_taxid` is not in the taxonomy.
    pub fn new(graph: &'a TaxonomyGraph, true_taxid: TaxId) -> Option<Self> {
        let true_depth = graph.depth(true_taxid)?;
        Some(Self {
            graph,
            true_taxid,
            true_depth,
            ancestors: lineage_iter(graph, true_taxid).collect(),
        })
    }

    pub fn true_taxid(&self) -> TaxId {
        self.true_taxid
    }

    /// LCA geometry of `(true_taxid, pred_taxid)`; `None` if `pred_taxid` is unknown.
    ///
    /// The predicted lineage is walked nearest-first, so the first hit in the
    /// true ancestor set is the lowest common ancestor. Without any common
    /// ancestor the true taxon itself stands in as the LCA.
    pub fn geometry(&self, pred_taxid: TaxId) -> Option<LcaGeometry> {
        let pred_depth = self.graph.depth(pred_taxid)?;

        let lca = if pred_taxid == self.true_taxid {
            self.true_taxid
        } else {
            let mut pred_lineage: Lineage<'_> = lineage_iter(self.graph, pred_taxid);
            pred_lineage
                .find(|t| self.ancestors.contains(t))
                .unwrap_or(self.true_taxid)
        };

        let lca_depth = self.graph.depth(lca).unwrap_or(0);
        Some(LcaGeometry {
            lca,
            up: self.true_depth.saturating_sub(lca_depth),
            down: pred_depth.saturating_sub(lca_depth),
            child_count: self.graph.child_count(lca).unwrap_or(0),
            rank: self.graph.rank(lca).unwrap_or(NO_RANK).to_string(),
        })
    }
}

/// One-off LCA of two taxa; `None` if either is absent from the taxonomy.
pub fn lca(graph: &TaxonomyGraph, true_taxid: TaxId, pred_taxid: TaxId) -> Option<LcaGeometry> {
    LcaEngine::new(graph, true_taxid)?.geometry(pred_taxid)
}
