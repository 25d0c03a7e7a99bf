use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::error::Error;
use std::path::{Path, PathBuf};

use taxentropy_rs::batch::{run_batch, BatchEvent, CancelToken};
use taxentropy_rs::config::{
    default_workers, BatchConfig, JobSource, ScoringParams, DEFAULT_ALPHA_DOWN, DEFAULT_ALPHA_UP,
    DEFAULT_COMPRESS_LEVEL,
};
use taxentropy_rs::lineage::format_lineage;
use taxentropy_rs::pairs::score_pairs;
use taxentropy_rs::taxdb::TaxonomyGraph;
use taxentropy_rs::types::{JobStatus, TaxId};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Taxonomy-aware entropy scoring of classifier predictions.
#[derive(Parser, Debug)]
#[command(name = "taxentropy", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score many classifier output files in parallel and write a summary
    Batch(BatchArgs),
    /// Score a headed TSV of (read, true taxid, predicted taxid) rows
    Pairs(PairsArgs),
    /// Print the lineage of one or more taxids
    Lineage(LineageArgs),
}

#[derive(Args, Debug)]
struct ScoringArgs {
    /// Weight of steps from the true taxon up to the LCA
    #[arg(long, default_value_t = DEFAULT_ALPHA_UP)]
    alpha_up: f64,

    /// Weight of steps from the LCA down to the prediction
    #[arg(long, default_value_t = DEFAULT_ALPHA_DOWN)]
    alpha_down: f64,

    /// Entropy given to unclassified reads (no value when unset)
    #[arg(long)]
    unclassified_entropy: Option<f64>,
}

impl ScoringArgs {
    fn params(&self) -> ScoringParams {
        ScoringParams {
            alpha_up: self.alpha_up,
            alpha_down: self.alpha_down,
            unclassified_entropy: self.unclassified_entropy,
            ..ScoringParams::default()
        }
    }
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// NCBI nodes.dmp (or tab-separated taxid/parent/rank), optionally gzipped
    #[arg(long)]
    nodes_dmp: PathBuf,

    /// Two-column TSV of classifier output path and true taxid
    #[arg(long, conflicts_with_all = ["key_file", "kraken_dir"])]
    jobs_tsv: Option<PathBuf>,

    /// Key TSV with dataset, filename and true_taxid columns
    #[arg(long, requires = "kraken_dir")]
    key_file: Option<PathBuf>,

    /// Directory holding `<dataset>_<filename>_db<N>.out[.gz]` files
    #[arg(long, requires = "key_file")]
    kraken_dir: Option<PathBuf>,

    #[arg(long)]
    outdir: PathBuf,

    #[arg(long)]
    summary_tsv: PathBuf,

    /// Scan the kraken directory recursively
    #[arg(long)]
    recursive: bool,

    /// Number of parallel workers
    #[arg(long, default_value_t = default_workers())]
    jobs: usize,

    #[command(flatten)]
    scoring: ScoringArgs,

    /// Write gzip-compressed per-job outputs
    #[arg(long)]
    gzip: bool,

    #[arg(long, default_value_t = DEFAULT_COMPRESS_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
    compresslevel: u32,

    /// Write only read_id, true_taxid, pred_taxid and entropy
    #[arg(long)]
    no_diagnostics: bool,

    /// Leave jobs whose output already exists and is non-empty untouched
    #[arg(long)]
    skip_existing: bool,

    /// Fail on the first malformed taxonomy line instead of skipping it
    #[arg(long)]
    strict_taxonomy: bool,
}

#[derive(Args, Debug)]
struct PairsArgs {
    #[arg(long)]
    nodes_dmp: PathBuf,

    /// Input TSV with a header row
    #[arg(long)]
    input: PathBuf,

    /// Output TSV (gzip when the name ends in .gz)
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    scoring: ScoringArgs,

    #[arg(long)]
    strict_taxonomy: bool,
}

#[derive(Args, Debug)]
struct LineageArgs {
    #[arg(long)]
    nodes_dmp: PathBuf,

    /// Separator between lineage entries
    #[arg(long, default_value = ";")]
    sep: String,

    #[arg(required = true)]
    taxids: Vec<TaxId>,
}

fn spinner(color: &str, msg: &str) -> Result<ProgressBar, Box<dyn Error>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(TICKS)
            .template(&format!("{{spinner:.{}}} {{msg}}", color))?,
    );
    spinner.set_message(msg.to_string());
    Ok(spinner)
}

fn load_taxonomy(path: &Path, strict: bool) -> Result<TaxonomyGraph, Box<dyn Error>> {
    let spinner = spinner("blue", &format!("Loading taxonomy from {}...", path.display()))?;
    let graph = TaxonomyGraph::load(path, strict)?;
    spinner.finish_with_message(format!("Loaded {} taxonomy nodes.", graph.len()));
    Ok(graph)
}

/// First Ctrl-C stops new jobs from starting and lets running ones finish so
/// the summary still gets written; a second one exits immediately.
fn cancel_on_ctrl_c(cancel: CancelToken) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    std::thread::Builder::new()
        .name("taxentropy-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Interrupted: finishing running jobs, press Ctrl-C again to abort");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            })
        })?;
    Ok(())
}

fn batch(args: BatchArgs) -> Result<(), Box<dyn Error>> {
    let source = JobSource::from_options(args.jobs_tsv, args.key_file, args.kraken_dir, args.recursive)?;

    let mut config = BatchConfig::new(args.outdir, args.summary_tsv);
    config.workers = args.jobs;
    config.gzip = args.gzip;
    config.compress_level = args.compresslevel;
    config.diagnostics = !args.no_diagnostics;
    config.skip_existing = args.skip_existing;
    config.scoring = args.scoring.params();

    let cancel = CancelToken::new();
    cancel_on_ctrl_c(cancel.clone())?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} jobs {msg}")?
            .progress_chars("=>-"),
    );

    let report = run_batch(
        &args.nodes_dmp,
        args.strict_taxonomy,
        &source,
        config,
        cancel.clone(),
        |event| match event {
            BatchEvent::Planned { jobs, missing_key } => {
                bar.set_length(jobs as u64);
                if missing_key > 0 {
                    bar.println(format!("{} output file(s) have no key entry", missing_key));
                }
            }
            BatchEvent::JobFinished(result) => {
                if let JobStatus::Error(msg) = &result.status {
                    bar.println(format!("{}: {}", result.job.path.display(), msg));
                }
                bar.inc(1);
            }
        },
    )?;

    let failed = report.count(|s| matches!(s, JobStatus::Error(_)));
    if cancel.is_cancelled() {
        bar.abandon_with_message(format!("cancelled after {} job(s), {} failed", report.results.len(), failed));
    } else {
        bar.finish_with_message(format!("done, {} failed", failed));
    }
    info!("Summary written to {}", report.summary_path.display());
    Ok(())
}

fn pairs(args: PairsArgs) -> Result<(), Box<dyn Error>> {
    let graph = load_taxonomy(&args.nodes_dmp, args.strict_taxonomy)?;
    let spinner = spinner("green", "Scoring pairs...")?;
    let summary = score_pairs(&graph, &args.input, &args.output, &args.scoring.params())?;
    spinner.finish_with_message(format!(
        "Scored {} row(s), {} with entropy. Wrote {}",
        summary.n_rows,
        summary.n_valid,
        args.output.display()
    ));
    Ok(())
}

fn lineage(args: LineageArgs) -> Result<(), Box<dyn Error>> {
    let graph = load_taxonomy(&args.nodes_dmp, false)?;
    for taxid in args.taxids {
        if graph.contains(taxid) {
            println!("{}\t{}", taxid, format_lineage(&graph, taxid, &args.sep));
        } else {
            println!("{}\tnot found", taxid);
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Batch(args) => batch(args),
        Command::Pairs(args) => pairs(args),
        Command::Lineage(args) => lineage(args),
    }
}
