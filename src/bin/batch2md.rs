//! CLI binary for batch2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, prints results and picks the exit code.

use anyhow::{Context, Result};
use batch2md::{
    convert_directory, format_progress, Backend, Batch2MdError, ConversionConfig,
    ConversionJob, ConversionProgressCallback, ConversionSummary, JobStatus, PlannedConversion,
    ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all documents plus a log line
/// per finished document. Lines are printed through the bar so they never
/// tear it.
struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgressCallback {
    /// Starts as a spinner; `on_batch_start` turns it into a bar once the
    /// scan has counted the documents.
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Looking for documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar, verbose })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        if total == 0 {
            self.bar.finish_and_clear();
            return;
        }
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} document(s)"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        self.bar.set_message(name_of(path));
    }

    fn on_stage(&self, index: usize, total: usize, status: JobStatus) {
        if self.verbose {
            let step = match status {
                JobStatus::ConvertingToPdf => "Converting to PDF…",
                JobStatus::ConvertingToMd => "Extracting Markdown…",
                _ => return,
            };
            self.bar
                .println(dim(&format!("  → [{index}/{total}] {step}")));
        }
    }

    fn on_file_complete(&self, index: usize, total: usize, job: &ConversionJob) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            format_progress(index, total, &name_of(job.input_path()), "completed"),
            dim(&format!("{:.1}s", job.elapsed_time())),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, job: &ConversionJob) {
        let error = job.error().unwrap_or("unknown error");
        // Tool output can run to many lines; keep the first one here.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 100 {
            let cut: String = first_line.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {}",
            red("✗"),
            format_progress(index, total, &name_of(job.input_path()), &red(&msg)),
        ));
        self.bar.inc(1);
    }

    fn on_file_planned(&self, index: usize, total: usize, plan: &PlannedConversion) {
        self.bar.println(format!(
            "  {} {}",
            dim("·"),
            format_progress(index, total, &name_of(&plan.input_path), "would be converted"),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _summary: &ConversionSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert everything under ./docs into ./docs/markdown
  batch2md ./docs

  # Separate output tree, top-level files only
  batch2md ./docs -o ./converted --no-recursive

  # Preview without converting
  batch2md ./docs --dry-run

  # Vision-language backend, longer MinerU budget
  batch2md ./docs --backend vlm --md-timeout 1200

  # Two documents at a time, machine-readable summary
  batch2md ./docs -w 2 --json > summary.json

SUPPORTED FORMATS:
  .docx .pptx .xlsx .doc .ppt .xls .odt .odp .ods .rtf .pdf

EXIT CODES:
  0  every document converted (or nothing to do, or dry run)
  1  some documents failed
  2  every document failed, or the run could not start
     (input directory missing, LibreOffice or MinerU not installed)
  3  unexpected internal error

ENVIRONMENT VARIABLES:
  BATCH2MD_SOFFICE     Path to the soffice executable
  BATCH2MD_MINERU      Path to the mineru executable
  MINERU_DEVICE_MODE   MinerU inference device (default here: cpu)
  RUST_LOG             Log filter, e.g. batch2md=debug
"#;

/// Batch convert documents to Markdown via PDF using MinerU.
#[derive(Parser, Debug)]
#[command(
    name = "batch2md",
    version,
    about = "Batch convert documents to Markdown via PDF using MinerU",
    long_about = "Convert every office document (Word, PowerPoint, Excel, OpenDocument, RTF) and \
PDF under a directory into Markdown. Non-PDF documents are first converted to PDF with \
LibreOffice; MinerU then extracts Markdown and images.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing documents to convert.
    input_dir: PathBuf,

    /// Output directory (default: INPUT_DIR/markdown/).
    #[arg(short, long = "output", env = "BATCH2MD_OUTPUT")]
    output_dir: Option<PathBuf>,

    /// Process only top-level files, skip subdirectories.
    #[arg(long, env = "BATCH2MD_NO_RECURSIVE")]
    no_recursive: bool,

    /// Show detailed progress information.
    #[arg(short, long, env = "BATCH2MD_VERBOSE")]
    verbose: bool,

    /// Preview what would be converted without converting.
    #[arg(long, env = "BATCH2MD_DRY_RUN")]
    dry_run: bool,

    /// MinerU backend.
    #[arg(long, env = "BATCH2MD_BACKEND", value_enum, default_value = "pipeline")]
    backend: BackendArg,

    /// Output results as JSON.
    #[arg(long, env = "BATCH2MD_JSON")]
    json: bool,

    /// Overwrite existing files instead of adding a timestamp.
    #[arg(long, env = "BATCH2MD_OVERWRITE")]
    overwrite: bool,

    /// Number of documents converted at once.
    #[arg(short, long, env = "BATCH2MD_WORKERS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    workers: u16,

    /// LibreOffice timeout per document, in seconds.
    #[arg(long, env = "BATCH2MD_PDF_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    pdf_timeout: u64,

    /// MinerU timeout per document, in seconds.
    #[arg(long, env = "BATCH2MD_MD_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    md_timeout: u64,

    /// Suppress all output except errors and the JSON summary.
    #[arg(short, long, env = "BATCH2MD_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "BATCH2MD_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Pipeline,
    Vlm,
    Vllm,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Pipeline => Backend::Pipeline,
            BackendArg::Vlm => Backend::Vlm,
            BackendArg::Vllm => Backend::Vllm,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(err) => {
            eprintln!("{} {err:#}", red("Error:"));
            ExitCode::from(error_exit_code(&err))
        }
    }
}

/// Fatal library errors carry their own code; anything else is internal.
fn error_exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Batch2MdError>()
        .map(Batch2MdError::exit_code)
        .unwrap_or(3)
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ConversionSummary> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(cli.verbose);
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    if config.verbose && !cli.quiet {
        eprintln!("Scanning directory: {}", config.input_dir.display());
        eprintln!("Excluding output directory: {}", config.output_dir().display());
        if config.dry_run {
            eprintln!("Dry run mode - no files will be converted");
        }
    }

    // Fatal errors keep their type so `main` can map them to exit codes.
    let summary = convert_directory(&config).await?;

    if summary.total_files() == 0 && !cli.quiet {
        eprintln!("No supported documents found");
    }

    if !show_progress && !cli.quiet && !config.json_output {
        print_file_lines(&summary);
    }

    if config.json_output {
        let json = summary
            .report()
            .to_json_pretty()
            .context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary);
    }

    Ok(summary)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder(&cli.input_dir)
        .recursive(!cli.no_recursive)
        .overwrite(cli.overwrite)
        .dry_run(cli.dry_run)
        .backend(cli.backend.into())
        .verbose(cli.verbose)
        .json_output(cli.json)
        .max_workers(usize::from(cli.workers))
        .pdf_timeout_secs(cli.pdf_timeout)
        .md_timeout_secs(cli.md_timeout);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}

/// Per-document lines for runs without a progress bar.
fn print_file_lines(summary: &ConversionSummary) {
    let total = summary.total_files();
    for (i, plan) in summary.planned().iter().enumerate() {
        println!(
            "{}",
            format_progress(i + 1, total, &name_of(&plan.input_path), "would be converted")
        );
    }
    for job in summary.failed_jobs() {
        println!(
            "  ✗ {}: {}",
            name_of(job.input_path()),
            job.error().unwrap_or("unknown error")
        );
    }
}

fn print_summary(summary: &ConversionSummary) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    if summary.skipped() > 0 && summary.successful() + summary.failed() == 0 {
        println!(
            "Dry run: {} file(s) would be converted",
            bold(&summary.skipped().to_string())
        );
    } else {
        let mark = match summary.exit_code() {
            0 => green("✔"),
            1 => cyan("⚠"),
            _ => red("✘"),
        };
        println!(
            "{mark} Summary: {}/{} files converted successfully",
            bold(&summary.successful().to_string()),
            summary.total_files()
        );
        if summary.failed() > 0 {
            println!("  {} failed", red(&summary.failed().to_string()));
        }
    }
    println!("Elapsed time: {:.1}s", summary.elapsed_time());
    println!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_keep_their_code() {
        let err = anyhow::Error::new(Batch2MdError::InputDirNotFound {
            path: PathBuf::from("missing"),
        });
        assert_eq!(error_exit_code(&err), 2);

        let err = anyhow::Error::new(Batch2MdError::Internal("boom".into()));
        assert_eq!(error_exit_code(&err), 3);
    }

    #[test]
    fn unexpected_errors_are_internal() {
        let err = anyhow::anyhow!("Failed to serialise summary");
        assert_eq!(error_exit_code(&err), 3);

        let io = io::Error::other("disk gone");
        let err = anyhow::Error::new(io).context("writing report");
        assert_eq!(error_exit_code(&err), 3);
    }

    #[test]
    fn config_carries_output_flags() {
        let cli = Cli::parse_from(["batch2md", "docs", "--json", "-v", "-w", "3"]);
        let config = build_config(&cli, None).unwrap();
        assert!(config.json_output);
        assert!(config.verbose);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.output_dir(), PathBuf::from("docs/markdown"));
    }
}
