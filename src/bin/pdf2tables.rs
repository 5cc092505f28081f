//! CLI binary for pdf2tables.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, renders progress snapshots, and prints the result.

use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2tables::{
    run_conversion, CancellationToken, ConversionConfig, JobResult, NoopProgressSink,
    ProgressSink, ProgressSnapshot,
};
use std::io;
use std::path::PathBuf;
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
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress sink: a percent bar anchored at the bottom, fed from
/// the pipeline's snapshots.
struct CliProgressSink {
    bar: ProgressBar,
}

impl CliProgressSink {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ProgressSink for CliProgressSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.bar.set_position(snapshot.percent as u64);
        self.bar
            .set_message(format!("{} tables", snapshot.tables_found));
        self.bar.println(format!("  {}", snapshot.message));
    }
}

/// Plain sink for `--no-progress` / `--json` runs: snapshots go to stderr.
struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        eprintln!("[{:>3}%] {}", snapshot.percent, snapshot.message);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every table into report.tables.zip
  pdf2tables report.pdf

  # Explicit output path, more extraction workers
  pdf2tables report.pdf -o tables.zip --workers 6

  # Fixed batch size for reproducible batch boundaries
  pdf2tables --batch-size 50 big-manual.pdf

  # Structured JSON result for scripting
  pdf2tables --json report.pdf > result.json

ENGINES:
  Page counting uses a pdfium shared library, bound at runtime.
  Table extraction uses tabula-java when built with `--features tabula`:
    export TABULA_JAR=/path/to/tabula-java.jar
  Without it, inject engines through the library API instead.

CANCELLATION:
  Ctrl-C requests cooperative cancellation: in-flight batches finish,
  nothing new starts, and no further output is written.
"#;

/// Extract the tables of a PDF document into a workbook.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tables",
    version,
    about = "Extract tables from PDF documents into a workbook",
    long_about = "Extract every table of a (possibly very large) PDF document into a workbook \
artifact, using an adaptive parallel batch pipeline with progress reporting, memory \
governance, and cooperative cancellation.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the workbook to this path. Default: <input>.tables.zip
    #[arg(short, long, env = "PDF2TABLES_OUTPUT")]
    output: Option<PathBuf>,

    /// Upper bound on concurrent extraction calls.
    #[arg(short, long, env = "PDF2TABLES_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Fixed pages per batch (default: tiered by document size).
    #[arg(long, env = "PDF2TABLES_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Output structured JSON (JobResult) instead of a summary line.
    #[arg(long, env = "PDF2TABLES_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2TABLES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TABLES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let output = cli.output.clone().unwrap_or_else(|| {
        let mut path = cli.input.clone();
        path.set_extension("tables.zip");
        path
    });

    let config = ConversionConfig::builder().max_extract_workers(cli.workers);
    let config = match cli.batch_size {
        Some(pages) => config.batch_size(pages),
        None => config,
    }
    .build()?;

    // ── Cancellation: first Ctrl-C requests a cooperative stop ──────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} cancelling, waiting for in-flight batches…", cyan("◆"));
                cancel.cancel();
            }
        });
    }

    let sink: Arc<dyn ProgressSink> = if show_progress {
        CliProgressSink::new()
    } else if cli.quiet {
        Arc::new(NoopProgressSink)
    } else {
        Arc::new(LogProgressSink)
    };

    let result = run_conversion(&cli.input, &output, &config, sink, cancel).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        JobResult::Completed {
            tables_saved,
            stats,
            errors,
        } => {
            if !cli.quiet {
                eprintln!(
                    "{} {} tables saved to {}  ({} pages, {} batches, {:.1}s)",
                    green("✔"),
                    bold(&tables_saved.to_string()),
                    output.display(),
                    stats.total_pages,
                    stats.total_batches,
                    stats.total_duration_ms as f64 / 1000.0,
                );
                for error in &errors {
                    eprintln!("  {} {}", red("✗"), error);
                }
            }
            Ok(())
        }
        JobResult::Cancelled => {
            eprintln!("{} conversion cancelled", red("✘"));
            std::process::exit(130);
        }
        JobResult::Failed { reason } => bail!(reason),
    }
}
