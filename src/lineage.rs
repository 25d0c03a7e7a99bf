//src/lineage.rs

use ahash::AHashSet;

use crate::taxdb::TaxonomyGraph;
use crate::types::{TaxId, NO_RANK};

/// Walks from a taxon towards its root, nearest first.
///
/// Stops after the first node whose parent is itself, is absent from the
/// taxonomy, or was already visited (malformed cyclic chains).
pub struct Lineage<'a> {
    graph: &'a TaxonomyGraph,
    next: Option<TaxId>,
    seen: AHashSet<TaxId>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = TaxId;

    fn next(&mut self) -> Option<TaxId> {
        let current = self.next.take()?;
        self.seen.insert(current);

        self.next = match self.graph.parent(current) {
            Some(p) if p != current && self.graph.contains(p) && !self.seen.contains(&p) => Some(p),
            _ => None,
        };
        Some(current)
    }
}

/// Lazy lineage of `taxid`. Empty if the taxon is unknown.
pub fn lineage_iter(graph: &TaxonomyGraph, taxid: TaxId) -> Lineage<'_> {
    Lineage {
        graph,
        next: graph.contains(taxid).then_some(taxid),
        seen: AHashSet::new(),
    }
}

/// `[taxid, parent(taxid), ..., root]`, or empty if `taxid` is unknown.
pub fn lineage(graph: &TaxonomyGraph, taxid: TaxId) -> Vec<TaxId> {
    lineage_iter(graph, taxid).collect()
}

/// Lineage rendered as `taxid:rank` pairs separated by `sep`.
pub fn format_lineage(graph: &TaxonomyGraph, taxid: TaxId, sep: &str) -> String {
    lineage_iter(graph, taxid)
        .map(|t| format!("{}:{}", t, graph.rank(t).unwrap_or(NO_RANK)))
        .collect::<Vec<_>>()
        .join(sep)
}
