//src/taxdb.rs

use ahash::{AHashMap, AHashSet};
use log::{info, warn};
use std::io::BufRead;
use std::path::Path;

use crate::error::TaxonomyError;
use crate::textio::open_text_reader;
use crate::types::TaxId;

pub type ParentMap = AHashMap<TaxId, TaxId>;
pub type RankMap = AHashMap<TaxId, String>;
pub type DepthMap = AHashMap<TaxId, u32>;
pub type ChildCountMap = AHashMap<TaxId, u32>;

/// In-memory taxonomy tree built from a node dump.
///
/// Read-only once built; batch workers share one instance behind an `Arc`.
/// Every lookup returns `None` for taxa absent from the dump.
#[derive(Debug, Default, Clone)]
pub struct TaxonomyGraph {
    parent: ParentMap,
    rank: RankMap,
    depth: DepthMap,
    child_count: ChildCountMap,
    skipped_lines: usize,
}

/// Split one node-dump line into `(taxid, parent, rank)`.
///
/// Accepts NCBI `nodes.dmp` lines:
/// ```text
/// 9606\t|\t9605\t|\tspecies\t|\t...
/// ```
/// and plain tab-separated `<taxid>\t<parent>\t<rank>...` lines.
/// Extra trailing fields are ignored.
fn parse_node_line(line: &str) -> Option<(TaxId, TaxId, &str)> {
    let mut fields = if line.contains('|') {
        line.split('|')
    } else {
        line.split('\t')
    };

    let taxid = fields.next()?.trim().parse().ok()?;
    let parent = fields.next()?.trim().parse().ok()?;
    let rank = fields.next()?.trim();
    Some((taxid, parent, rank))
}

impl TaxonomyGraph {
    /// Load a node dump (optionally `.gz`).
    ///
    /// Malformed lines (fewer than three fields, non-numeric ids) are skipped
    /// and counted, unless `strict` is set, in which case the first one is fatal.
    pub fn load<P: AsRef<Path>>(path: P, strict: bool) -> Result<Self, TaxonomyError> {
        let path = path.as_ref();
        let reader = open_text_reader(path)?;
        let graph = Self::from_reader(reader, strict)?;

        if graph.is_empty() {
            return Err(TaxonomyError::Empty { path: path.to_path_buf() });
        }
        if graph.skipped_lines > 0 {
            warn!(
                "Skipped {} malformed line(s) in {}",
                graph.skipped_lines,
                path.display()
            );
        }
        info!("Loaded {} taxonomy nodes from {}", graph.len(), path.display());
        Ok(graph)
    }

    pub fn from_reader<R: BufRead>(reader: R, strict: bool) -> Result<Self, TaxonomyError> {
        let mut nodes = Vec::new();
        let mut skipped_lines = 0;

        for (idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_node_line(&line) {
                Some((taxid, parent, rank)) => nodes.push((taxid, parent, rank.to_string())),
                None if strict => {
                    return Err(TaxonomyError::MalformedLine { line_no: idx + 1, line });
                }
                None => skipped_lines += 1,
            }
        }

        let mut graph = Self::from_nodes(nodes);
        graph.skipped_lines = skipped_lines;
        Ok(graph)
    }

    /// Build directly from `(taxid, parent, rank)` triples. Later duplicates win.
    pub fn from_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (TaxId, TaxId, S)>,
        S: Into<String>,
    {
        let mut parent = ParentMap::new();
        let mut rank = RankMap::new();
        for (taxid, parent_id, rank_name) in nodes {
            parent.insert(taxid, parent_id);
            rank.insert(taxid, rank_name.into());
        }

        let depth = compute_depths(&parent);
        let child_count = count_children(&parent);

        Self {
            parent,
            rank,
            depth,
            child_count,
            skipped_lines: 0,
        }
    }

    pub fn contains(&self, taxid: TaxId) -> bool {
        self.parent.contains_key(&taxid)
    }

    pub fn parent(&self, taxid: TaxId) -> Option<TaxId> {
        self.parent.get(&taxid).copied()
    }

    pub fn rank(&self, taxid: TaxId) -> Option<&str> {
        self.rank.get(&taxid).map(String::as_str)
    }

    /// Edges from the node's root. Nodes whose chain cannot reach a known
    /// root (missing parent, cycle) are treated as synthetic roots at depth 0.
    pub fn depth(&self, taxid: TaxId) -> Option<u32> {
        self.depth.get(&taxid).copied()
    }

    /// Number of nodes whose parent is `taxid`. A self-parented root counts itself.
    pub fn child_count(&self, taxid: TaxId) -> Option<u32> {
        if !self.contains(taxid) {
            return None;
        }
        Some(self.child_count.get(&taxid).copied().unwrap_or(0))
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// How many non-blank lines were dropped as malformed while loading.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}

/// Iteratively assign depths, memoized across starting nodes.
///
/// Each walk climbs until it reaches a node of known depth, a root (self
/// parent or parent absent from the map) or a node already on the current
/// walk. In the last case the node closing the cycle gets depth 0.
fn compute_depths(parent: &ParentMap) -> DepthMap {
    let mut depth = DepthMap::with_capacity(parent.len());
    let mut path: Vec<TaxId> = Vec::new();
    let mut on_path: AHashSet<TaxId> = AHashSet::new();

    for &start in parent.keys() {
        if depth.contains_key(&start) {
            continue;
        }
        path.clear();
        on_path.clear();

        let mut node = start;
        let mut base = loop {
            path.push(node);
            on_path.insert(node);
            match parent.get(&node) {
                Some(&p) if p != node && parent.contains_key(&p) => {
                    if let Some(&d) = depth.get(&p) {
                        break d + 1;
                    }
                    if on_path.contains(&p) {
                        break 0;
                    }
                    node = p;
                }
                _ => break 0,
            }
        };

        while let Some(n) = path.pop() {
            depth.insert(n, base);
            base += 1;
        }
    }
    depth
}

fn count_children(parent: &ParentMap) -> ChildCountMap {
    let mut counts = ChildCountMap::new();
    for &parent_id in parent.values() {
        *counts.entry(parent_id).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    /// root(1) -> A(2, genus) -> {B(3), C(4)} species
    fn small_tree() -> TaxonomyGraph {
        TaxonomyGraph::from_nodes(vec![
            (1, 1, "no rank"),
            (2, 1, "genus"),
            (3, 2, "species"),
            (4, 2, "species"),
        ])
    }

    #[test]
    fn test_depths_and_children() {
        let g = small_tree();
        assert_eq!(g.depth(1), Some(0));
        assert_eq!(g.depth(2), Some(1));
        assert_eq!(g.depth(3), Some(2));
        assert_eq!(g.depth(4), Some(2));
        assert_eq!(g.child_count(2), Some(2));
        assert_eq!(g.child_count(3), Some(0));
        // self-parented root counts itself
        assert_eq!(g.child_count(1), Some(2));
        assert_eq!(g.child_count(99), None);
        assert_eq!(g.depth(99), None);
        assert_eq!(g.rank(2), Some("genus"));
    }

    #[test]
    fn test_depth_increases_by_one_along_parent_edges() {
        let g = TaxonomyGraph::from_nodes(vec![
            (1, 1, "no rank"),
            (10, 1, "superkingdom"),
            (20, 10, "phylum"),
            (30, 20, "class"),
            (40, 30, "order"),
            (41, 30, "order"),
            (50, 41, "family"),
        ]);
        for id in [10, 20, 30, 40, 41, 50] {
            let p = g.parent(id).unwrap();
            assert_eq!(g.depth(id).unwrap(), g.depth(p).unwrap() + 1, "taxid {}", id);
        }
    }

    #[test]
    fn test_missing_parent_is_synthetic_root() {
        let g = TaxonomyGraph::from_nodes(vec![(5, 777, "genus"), (6, 5, "species")]);
        assert_eq!(g.depth(5), Some(0));
        assert_eq!(g.depth(6), Some(1));
    }

    #[test]
    fn test_cycle_terminates() {
        let g = TaxonomyGraph::from_nodes(vec![
            (7, 8, "genus"),
            (8, 7, "family"),
            (9, 7, "species"),
        ]);
        for id in [7, 8, 9] {
            assert!(g.depth(id).is_some());
        }
        // one of the cycle members is a synthetic root, the other sits below it
        let mut cycle = [g.depth(7).unwrap(), g.depth(8).unwrap()];
        cycle.sort();
        assert_eq!(cycle, [0, 1]);
        assert_eq!(g.depth(9).unwrap(), g.depth(7).unwrap() + 1);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let n = 200_000u32;
        let nodes = (1..=n).map(|i| (i, if i == 1 { 1 } else { i - 1 }, "no rank"));
        let g = TaxonomyGraph::from_nodes(nodes);
        assert_eq!(g.depth(n), Some(n - 1));
    }

    #[test]
    fn test_parse_ncbi_nodes_dmp() {
        let dump = "1\t|\t1\t|\tno rank\t|\t\t|\t8\t|\n\
                    2\t|\t1\t|\tsuperkingdom\t|\t\t|\t0\t|\n\
                    \n\
                    1224\t|\t2\t|\tphylum\t|\t\t|\t0\t|\n";
        let g = TaxonomyGraph::from_reader(Cursor::new(dump), true).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.rank(1224), Some("phylum"));
        assert_eq!(g.depth(1224), Some(2));
        assert_eq!(g.skipped_lines(), 0);
    }

    #[test]
    fn test_parse_tab_separated() {
        let dump = "1\t1\tno rank\n2\t1\tgenus\textra\tfields\n";
        let g = TaxonomyGraph::from_reader(Cursor::new(dump), false).unwrap();
        assert_eq!(g.parent(2), Some(1));
        assert_eq!(g.rank(2), Some("genus"));
    }

    #[test]
    fn test_malformed_lines_skipped_or_fatal() {
        let dump = "1\t|\t1\t|\tno rank\t|\ngarbage\n3\t|\t1\n";
        let g = TaxonomyGraph::from_reader(Cursor::new(dump), false).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.skipped_lines(), 2);

        let err = TaxonomyGraph::from_reader(Cursor::new(dump), true).unwrap_err();
        match err {
            TaxonomyError::MalformedLine { line_no, .. } => assert_eq!(line_no, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_gz_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gz_path = dir.path().join("nodes.dmp.gz");
        {
            let f = std::fs::File::create(&gz_path).unwrap();
            let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
            enc.write_all(b"1\t|\t1\t|\tno rank\t|\n2\t|\t1\t|\tgenus\t|\n").unwrap();
            enc.finish().unwrap();
        }
        let g = TaxonomyGraph::load(&gz_path, false).unwrap();
        assert_eq!(g.len(), 2);

        let empty = dir.path().join("empty.dmp");
        std::fs::write(&empty, "not a node line\n").unwrap();
        assert!(matches!(
            TaxonomyGraph::load(&empty, false),
            Err(TaxonomyError::Empty { .. })
        ));
        assert!(matches!(
            TaxonomyGraph::load(dir.path().join("absent.dmp"), false),
            Err(TaxonomyError::Io(_))
        ));
    }
}
