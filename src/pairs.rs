//src/pairs.rs

use ahash::AHashMap;
use log::info;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::{ScoringParams, DEFAULT_COMPRESS_LEVEL};
use crate::error::{BatchError, ConfigError};
use crate::score::{EntropyScorer, Prediction};
use crate::taxdb::TaxonomyGraph;
use crate::textio::{open_text_reader, TextWriter};
use crate::types::{PredictionScore, TaxId};

pub const READ_ID_COLUMNS: &[&str] = &["read_id", "readID", "SequenceID", "seq_id", "read"];
pub const TRUE_TAXID_COLUMNS: &[&str] = &["true_taxid", "truth_taxid", "true", "gold_taxid"];
pub const PRED_TAXID_COLUMNS: &[&str] = &["pred_taxid", "predicted_taxid", "call_taxid", "pred"];

const APPENDED_COLUMNS: &str = "entropy\tlca_taxid\tlca_rank\tup_from_true\tdown_to_pred\tbranch_size_LCA";

/// Entropy statistics over the rows that had a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairsSummary {
    pub n_rows: u64,
    pub n_valid: u64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PairsSummary {
    fn add(&mut self, h: f64) {
        let n = self.n_valid as f64;
        self.mean = Some(self.mean.map_or(h, |m| (m * n + h) / (n + 1.0)));
        self.min = Some(self.min.map_or(h, |m| m.min(h)));
        self.max = Some(self.max.map_or(h, |m| m.max(h)));
        self.n_valid += 1;
    }
}

/// Index of the first candidate column present in `header`.
pub fn pick_column(header: &[&str], candidates: &[&str]) -> Result<usize, ConfigError> {
    candidates
        .iter()
        .find_map(|c| header.iter().position(|h| h == c))
        .ok_or_else(|| ConfigError::MissingColumn {
            expected: candidates.iter().map(|s| s.to_string()).collect(),
            found: header.iter().map(|s| s.to_string()).collect(),
        })
}

/// Score a headed TSV of (read, true taxid, predicted taxid) rows.
///
/// Every input column is copied through and the entropy plus LCA diagnostics
/// are appended. Unlike batch jobs the true taxon varies per row, so the memo
/// is keyed by the pair.
pub fn score_pairs<P: AsRef<Path>, Q: AsRef<Path>>(
    graph: &TaxonomyGraph,
    input: P,
    output: Q,
    params: &ScoringParams,
) -> Result<PairsSummary, BatchError> {
    params.validate()?;
    let output = output.as_ref();
    let write_err = |source| BatchError::Write { path: output.to_path_buf(), source };

    let mut lines = open_text_reader(input.as_ref()).map_err(ConfigError::from)?.lines();
    let header_line = match lines.next() {
        Some(line) => line.map_err(ConfigError::from)?,
        None => String::new(),
    };
    let header_line = header_line.trim_end_matches('\r').to_string();
    let header: Vec<&str> = header_line.split('\t').collect();

    let read_col = pick_column(&header, READ_ID_COLUMNS)?;
    let true_col = pick_column(&header, TRUE_TAXID_COLUMNS)?;
    let pred_col = pick_column(&header, PRED_TAXID_COLUMNS)?;
    info!(
        "Using columns: read_id={}, true_taxid={}, pred_taxid={}",
        header[read_col], header[true_col], header[pred_col]
    );

    let mut out = TextWriter::create(output, DEFAULT_COMPRESS_LEVEL).map_err(write_err)?;
    writeln!(out, "{}\t{}", header_line, APPENDED_COLUMNS).map_err(write_err)?;

    let mut memo: AHashMap<(Option<TaxId>, Prediction), PredictionScore> = AHashMap::new();
    let mut summary = PairsSummary::default();

    for line in lines {
        let line = line.map_err(ConfigError::from)?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        let true_taxid = field(true_col).trim().parse::<TaxId>().ok();
        let pred = Prediction::from_token(field(pred_col));
        let score = memo
            .entry((true_taxid, pred))
            .or_insert_with(|| EntropyScorer::new(graph, true_taxid, params).score(pred));

        summary.n_rows += 1;
        if let Some(h) = score.entropy {
            summary.add(h);
        }

        // keep the column count stable for short rows
        let mut row = fields.join("\t");
        for _ in fields.len()..header.len() {
            row.push('\t');
        }
        writeln!(out, "{}\t{}", row, score.diagnostic_fields()).map_err(write_err)?;
    }
    out.finish().map_err(write_err)?;

    match summary.mean {
        Some(mean) => info!(
            "Entropy over {} valid pair(s) of {}: mean={:.4} min={:.4} max={:.4}",
            summary.n_valid,
            summary.n_rows,
            mean,
            summary.min.unwrap_or(mean),
            summary.max.unwrap_or(mean)
        ),
        None => info!("No valid entropy values computed (check taxids and input columns)"),
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn graph() -> TaxonomyGraph {
        TaxonomyGraph::from_nodes(vec![
            (1, 1, "no rank"),
            (2, 1, "genus"),
            (3, 2, "species"),
            (4, 2, "species"),
        ])
    }

    #[test]
    fn test_pick_column_prefers_first_candidate() {
        let header = ["SequenceID", "pred", "true_taxid", "read_id"];
        assert_eq!(pick_column(&header, READ_ID_COLUMNS).unwrap(), 3);
        assert_eq!(pick_column(&header, PRED_TAXID_COLUMNS).unwrap(), 1);
        assert!(matches!(
            pick_column(&["a", "b"], TRUE_TAXID_COLUMNS),
            Err(ConfigError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_score_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pairs.tsv");
        let output = dir.path().join("scored.tsv");
        fs::write(
            &input,
            "SequenceID\ttrue_taxid\tpred_taxid\tnote\n\
             r1\t3\t4\tx\n\
             r2\t3\t3\ty\n\
             r3\t3\t0\tz\n\
             r4\t3\tNA\n\
             r5\t999\t3\tw\n",
        )
        .unwrap();

        let params = ScoringParams::default();
        let summary = score_pairs(&graph(), &input, &output, &params).unwrap();
        assert_eq!(summary.n_rows, 5);
        assert_eq!(summary.n_valid, 2);
        let h = 0.30 * 3f64.log2() * 1.3;
        assert!((summary.mean.unwrap() - h / 2.0).abs() < 1e-12);
        assert_eq!(summary.min, Some(0.0));
        assert!((summary.max.unwrap() - h).abs() < 1e-12);

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "SequenceID\ttrue_taxid\tpred_taxid\tnote\tentropy\tlca_taxid\tlca_rank\tup_from_true\tdown_to_pred\tbranch_size_LCA"
        );
        assert!(lines[1].ends_with("\t2\tgenus\t1\t1\t2"));
        assert_eq!(lines[2], "r2\t3\t3\ty\t0.0\t3\tspecies\t0\t0\t0");
        assert_eq!(lines[3], "r3\t3\t0\tz\t\t\t\t\t\t");
        assert_eq!(lines[4], "r4\t3\tNA\t\t\t\t\t\t\t");
        assert_eq!(lines[5], "r5\t999\t3\tw\t\t\t\t\t\t");
        for l in &lines {
            assert_eq!(l.split('\t').count(), 10);
        }
    }

    #[test]
    fn test_missing_columns_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pairs.tsv");
        fs::write(&input, "a\tb\tc\n1\t2\t3\n").unwrap();
        let err = score_pairs(&graph(), &input, dir.path().join("o.tsv"), &ScoringParams::default()).unwrap_err();
        assert!(matches!(err, BatchError::Config(ConfigError::MissingColumn { .. })));
    }
}
