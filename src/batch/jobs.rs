// src/batch/jobs.rs

use ahash::AHashMap;
use log::{info, warn};
use regex::Regex;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::config::BatchConfig;
use crate::error::ConfigError;
use crate::textio::open_text_reader;
use crate::types::Job;

/// Pieces of a `{dataset}_{filename}_db{N}.out[.gz]` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub dataset: String,
    pub filename: String,
    pub db: String,
}

fn output_name_pattern() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| {
        Regex::new(r"^(?P<dataset>[^_]+)_(?P<filename>.+)_db(?P<db>\d+)\.out(?:\.gz)?$")
            .expect("static regex")
    })
}

/// Split a classifier output file name into dataset, filename stem and db index.
pub fn parse_output_name(name: &str) -> Option<OutputName> {
    let caps = output_name_pattern().captures(name)?;
    Some(OutputName {
        dataset: caps["dataset"].to_string(),
        filename: caps["filename"].to_string(),
        db: caps["db"].to_string(),
    })
}

/// `(dataset, filename) -> true taxid`, read from a key file.
#[derive(Debug, Default, Clone)]
pub struct KeyMap {
    entries: AHashMap<(String, String), String>,
}

impl KeyMap {
    /// Parse a TSV key file with a header naming at least the
    /// `filename`, `dataset` and `taxid` columns, in any order.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_reader(open_text_reader(path)?)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ConfigError> {
        let mut lines = reader.lines();
        let header: Vec<String> = match lines.next() {
            Some(line) => line?.trim_end_matches('\r').split('\t').map(|s| s.trim().to_string()).collect(),
            None => Vec::new(),
        };

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ConfigError::KeyFileMissingColumn {
                    column: name.to_string(),
                    found: header.clone(),
                })
        };
        let filename_col = column("filename")?;
        let dataset_col = column("dataset")?;
        let taxid_col = column("taxid")?;

        let mut entries = AHashMap::new();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
            let field = |i: usize| parts.get(i).map(|s| s.trim()).unwrap_or("");

            let (filename, dataset, taxid) = (field(filename_col), field(dataset_col), field(taxid_col));
            if !filename.is_empty() && !dataset.is_empty() && !taxid.is_empty() {
                entries.insert((dataset.to_string(), filename.to_string()), taxid.to_string());
            }
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, dataset: &str, filename: &str) -> Option<&str> {
        self.entries
            .get(&(dataset.to_string(), filename.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Scan `dir` for classifier outputs and pair each with its key entry.
///
/// Returns the jobs (sorted by path) and the matching files that have no key
/// entry. Files not following the naming pattern are ignored.
pub fn discover_jobs(
    dir: &Path,
    keys: &KeyMap,
    recursive: bool,
    config: &BatchConfig,
) -> Result<(Vec<Job>, Vec<PathBuf>), ConfigError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    let mut jobs = Vec::new();
    let mut missing_key = Vec::new();

    for entry in walker {
        let entry = entry.map_err(|e| ConfigError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = file_name_of(path);
        let Some(parsed) = parse_output_name(&name) else {
            continue;
        };

        match keys.lookup(&parsed.dataset, &parsed.filename) {
            Some(taxid) => jobs.push(Job {
                path: path.to_path_buf(),
                dataset: parsed.dataset,
                filename: parsed.filename,
                db: parsed.db,
                true_taxid: taxid.to_string(),
                out_path: config.output_path_for(&name),
            }),
            None => missing_key.push(path.to_path_buf()),
        }
    }

    if !missing_key.is_empty() {
        warn!("{} output file(s) have no key entry", missing_key.len());
    }
    info!("Discovered {} job(s) under {}", jobs.len(), dir.display());

    if jobs.is_empty() {
        return Err(ConfigError::NoJobsDiscovered { dir: dir.to_path_buf() });
    }
    Ok((jobs, missing_key))
}

/// Read an explicit job list: `path<TAB>true_taxid` per line.
/// Blank lines, `#` comments and rows with fewer than two columns are skipped.
pub fn read_job_list<P: AsRef<Path>>(path: P, config: &BatchConfig) -> Result<Vec<Job>, ConfigError> {
    let path = path.as_ref();
    let reader = open_text_reader(path)?;

    let mut jobs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split('\t');
        let (Some(job_path), Some(true_taxid)) = (parts.next(), parts.next()) else {
            continue;
        };

        let job_path = PathBuf::from(job_path.trim());
        let name = file_name_of(&job_path);
        let (dataset, filename, db) = match parse_output_name(&name) {
            Some(p) => (p.dataset, p.filename, p.db),
            None => (String::new(), name.clone(), String::new()),
        };

        jobs.push(Job {
            out_path: config.output_path_for(&name),
            path: job_path,
            dataset,
            filename,
            db,
            true_taxid: true_taxid.trim().to_string(),
        });
    }

    if jobs.is_empty() {
        return Err(ConfigError::EmptyJobList { path: path.to_path_buf() });
    }
    info!("Read {} job(s) from {}", jobs.len(), path.display());
    Ok(jobs)
}
