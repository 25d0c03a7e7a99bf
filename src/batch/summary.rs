// src/batch/summary.rs

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_COMPRESS_LEVEL;
use crate::textio::TextWriter;
use crate::types::{format_opt_f64, JobResult};

pub const SUMMARY_HEADER: &str =
    "path\tdataset\tfilename\tdb\ttrue_taxid\toutput\tstatus\tn_reads\tn_valid_entropy\tmean_entropy\n";

/// Name of the side list written next to the outputs in discovery mode.
pub const MISSING_KEY_FILE: &str = "missing_key_for_outputs.txt";

/// One summary line per result (without trailing newline).
pub fn summary_row(r: &JobResult) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        r.job.path.display(),
        r.job.dataset,
        r.job.filename,
        r.job.db,
        r.job.true_taxid,
        r.job.out_path.display(),
        r.status,
        r.n_reads,
        r.n_valid,
        format_opt_f64(r.mean_entropy)
    )
}

/// Write the batch summary, one row per job result.
pub fn write_summary<P: AsRef<Path>>(path: P, results: &[JobResult]) -> io::Result<()> {
    let mut out = TextWriter::create(path, DEFAULT_COMPRESS_LEVEL)?;
    out.write_all(SUMMARY_HEADER.as_bytes())?;
    for r in results {
        writeln!(out, "{}", summary_row(r))?;
    }
    out.finish()
}

/// Write `<outdir>/missing_key_for_outputs.txt`, one path per line.
pub fn write_missing_keys(outdir: &Path, missing: &[PathBuf]) -> io::Result<PathBuf> {
    let path = outdir.join(MISSING_KEY_FILE);
    let mut out = TextWriter::create(&path, 0)?;
    for p in missing {
        writeln!(out, "{}", p.display())?;
    }
    out.finish()?;
    Ok(path)
}
