// src/batch/worker.rs

use log::debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::BatchConfig;
use crate::error::JobError;
use crate::kraken_out::KrakenOutputReader;
use crate::score::{EntropyScorer, PredictionCache};
use crate::taxdb::TaxonomyGraph;
use crate::textio::TextWriter;
use crate::types::{format_opt_f64, Job, JobResult, JobStatus, TaxId};

pub const COMPACT_HEADER: &str = "read_id\ttrue_taxid\tpred_taxid\tentropy\n";
pub const DIAGNOSTIC_HEADER: &str =
    "read_id\ttrue_taxid\tpred_taxid\tentropy\tlca_taxid\tlca_rank\tup_from_true\tdown_to_pred\tbranch_size_LCA\n";

/// Running totals of one job.
#[derive(Debug, Default, Clone, Copy)]
struct JobCounts {
    n_reads: u64,
    n_valid: u64,
    sum_entropy: f64,
}

impl JobCounts {
    fn mean(&self) -> Option<f64> {
        if self.n_valid == 0 {
            None
        } else {
            Some(self.sum_entropy / self.n_valid as f64)
        }
    }
}

fn output_already_written(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Score every read of one classifier output file.
///
/// Never fails: I/O problems end up as an `error: ...` status with whatever
/// counts were reached before the failure.
pub fn process_job(graph: &TaxonomyGraph, job: &Job, config: &BatchConfig) -> JobResult {
    if config.skip_existing && output_already_written(&job.out_path) {
        debug!("Skipping {}: {} exists", job.path.display(), job.out_path.display());
        return JobResult {
            job: job.clone(),
            status: JobStatus::SkippedExisting,
            n_reads: 0,
            n_valid: 0,
            mean_entropy: None,
        };
    }

    let mut counts = JobCounts::default();
    let status = match score_file(graph, job, config, &mut counts) {
        Ok(()) => JobStatus::Ok,
        Err(e) => JobStatus::Error(e.to_string()),
    };
    let mean_entropy = match status {
        JobStatus::Ok => counts.mean(),
        _ => None,
    };

    JobResult {
        job: job.clone(),
        status,
        n_reads: counts.n_reads,
        n_valid: counts.n_valid,
        mean_entropy,
    }
}

fn score_file(
    graph: &TaxonomyGraph,
    job: &Job,
    config: &BatchConfig,
    counts: &mut JobCounts,
) -> Result<(), JobError> {
    if !job.path.is_file() {
        return Err(JobError::InputMissing(job.path.clone()));
    }
    let true_label = job.true_taxid.trim();
    let true_taxid = true_label.parse::<TaxId>().ok();

    let scorer = EntropyScorer::new(graph, true_taxid, &config.scoring);
    let mut cache = PredictionCache::new(scorer);

    let reader = KrakenOutputReader::open(&job.path)?;
    let mut out = TextWriter::create(&job.out_path, config.compress_level)?;
    let header = if config.diagnostics { DIAGNOSTIC_HEADER } else { COMPACT_HEADER };
    out.write_all(header.as_bytes())?;

    for record in reader {
        let record = record?;
        counts.n_reads += 1;

        let score = cache.get_or_compute(record.pred_taxid);
        if let Some(h) = score.entropy {
            counts.sum_entropy += h;
            counts.n_valid += 1;
        }

        if config.diagnostics {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                record.read_id,
                true_label,
                record.pred_taxid,
                score.diagnostic_fields()
            )?;
        } else {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                record.read_id,
                true_label,
                record.pred_taxid,
                format_opt_f64(score.entropy)
            )?;
        }
    }
    out.finish()?;

    debug!(
        "{}: {} reads, {} distinct predictions, {} cache hits",
        job.path.display(),
        counts.n_reads,
        cache.len(),
        cache.hits()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // root(1) -> A(2, genus) -> {B(3), C(4)}
    fn graph() -> TaxonomyGraph {
        TaxonomyGraph::from_nodes(vec![
            (1, 1, "no rank"),
            (2, 1, "genus"),
            (3, 2, "species"),
            (4, 2, "species"),
        ])
    }

    fn job(dir: &Path, input: &str, out: &str, true_taxid: &str) -> Job {
        Job {
            path: dir.join(input),
            dataset: String::new(),
            filename: input.to_string(),
            db: String::new(),
            true_taxid: true_taxid.to_string(),
            out_path: dir.join(out),
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(String::from).collect()
    }

    const READS: &str = "C\tr1\t4\t150\t4:10\n\
                         C\tr2\t3\t150\t3:10\n\
                         U\tr3\t0\t150\t0:10\n\
                         C\tr4\tunknown (taxid 999)\t150\t999:3\n\
                         C\tr5\t4\t150\t4:10\n";

    #[test]
    fn test_diagnostic_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.out"), READS).unwrap();
        let j = job(dir.path(), "in.out", "in.out.entropy.tsv", "3");
        let config = BatchConfig::new(dir.path(), dir.path().join("s.tsv"));

        let res = process_job(&graph(), &j, &config);
        assert_eq!(res.status, JobStatus::Ok);
        assert_eq!(res.n_reads, 5);
        assert_eq!(res.n_valid, 3);

        let h = 0.30 * 3f64.log2() * 1.3;
        assert!((res.mean_entropy.unwrap() - (2.0 * h) / 3.0).abs() < 1e-12);

        let lines = read_lines(&j.out_path);
        assert_eq!(lines[0], DIAGNOSTIC_HEADER.trim_end());
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("r1\t3\t4\t0.61"));
        assert!(lines[1].ends_with("\t2\tgenus\t1\t1\t2"));
        assert_eq!(lines[2], "r2\t3\t3\t0.0\t3\tspecies\t0\t0\t0");
        assert_eq!(lines[3], "r3\t3\t0\t\t\t\t\t\t");
        assert_eq!(lines[4], "r4\t3\t999\t\t\t\t\t\t");
        assert_eq!(lines[5], lines[1].replacen("r1", "r5", 1));
    }

    #[test]
    fn test_compact_gz_output_with_unclassified_value() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.out"), READS).unwrap();
        let j = job(dir.path(), "in.out", "in.out.entropy.tsv.gz", "3");
        let mut config = BatchConfig::new(dir.path(), dir.path().join("s.tsv"));
        config.diagnostics = false;
        config.gzip = true;
        config.scoring.unclassified_entropy = Some(5.0);

        let res = process_job(&graph(), &j, &config);
        assert_eq!(res.status, JobStatus::Ok);
        assert_eq!(res.n_valid, 4);

        let mut text = String::new();
        std::io::Read::read_to_string(
            &mut crate::textio::open_text_reader(&j.out_path).unwrap(),
            &mut text,
        )
        .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], COMPACT_HEADER.trim_end());
        assert_eq!(lines[3], "r3\t3\t0\t5.0");
        assert_eq!(lines[4], "r4\t3\t999\t");
    }

    #[test]
    fn test_unknown_true_taxid() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.out"), READS).unwrap();
        let j = job(dir.path(), "in.out", "o.tsv", "NA");
        let config = BatchConfig::new(dir.path(), dir.path().join("s.tsv"));
        let res = process_job(&graph(), &j, &config);
        assert_eq!(res.status, JobStatus::Ok);
        assert_eq!(res.n_reads, 5);
        assert_eq!(res.n_valid, 0);
        assert_eq!(res.mean_entropy, None);
    }

    #[test]
    fn test_missing_input_is_job_error() {
        let dir = tempfile::tempdir().unwrap();
        let j = job(dir.path(), "absent.out", "absent.tsv", "3");
        let config = BatchConfig::new(dir.path(), dir.path().join("s.tsv"));
        let res = process_job(&graph(), &j, &config);
        match &res.status {
            JobStatus::Error(msg) => assert!(msg.contains("absent.out")),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(!j.out_path.exists());
    }

    #[test]
    fn test_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.out"), READS).unwrap();
        let j = job(dir.path(), "in.out", "o.tsv", "3");
        let mut config = BatchConfig::new(dir.path(), dir.path().join("s.tsv"));
        config.skip_existing = true;

        // empty output does not count as done
        fs::write(&j.out_path, "").unwrap();
        assert_eq!(process_job(&graph(), &j, &config).status, JobStatus::Ok);
        let first = fs::read(&j.out_path).unwrap();

        let res = process_job(&graph(), &j, &config);
        assert_eq!(res.status, JobStatus::SkippedExisting);
        assert_eq!((res.n_reads, res.n_valid, res.mean_entropy), (0, 0, None));
        assert_eq!(fs::read(&j.out_path).unwrap(), first);
    }
}
