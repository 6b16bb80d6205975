//! CLI binary for docfuse.
//!
//! A thin shim over the library crate that maps CLI flags to `JobConfig`,
//! runs one convert-and-merge job over the given files, and writes the
//! merged PDF.

use anyhow::{Context, Result};
use clap::Parser;
use docfuse::{
    convert_files, write_output, JobConfig, JobProgressCallback, PageSize, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per finished
/// file. Files complete out of order under the concurrent renderer, so
/// per-file timing is keyed by slot index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_file_start(&self, index: usize, _total: usize, name: &str) {
        self.start_times.lock().unwrap().insert(index, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, page_count: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{page_count:>3} pages")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = truncate_message(error, 80);

        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_merge_start(&self, document_count: usize) {
        self.bar.set_prefix("Merging");
        self.bar
            .set_message(format!("{document_count} documents"));
    }

    fn on_job_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge two photos and a report into one PDF
  docfuse photo1.jpg photo2.png report.docx -o bundle.pdf

  # Everything in argument order, Letter pages, 4 workers
  docfuse --page-size letter -c 4 scan.pdf sheet.xlsx deck.pptx -o out.pdf

  # Machine-readable per-file report on stdout
  docfuse --json a.png b.docx -o out.pdf > report.json

  # Custom page geometry (points) and tighter margins
  docfuse --page-size 500x700 --margin 18 slides.pptx -o out.pdf

SUPPORTED INPUTS:
  images        .jpg .jpeg .png .gif (animated → page per frame) .bmp .tiff .tif .webp
  spreadsheets  .xlsx .xls
  documents     .docx           (.doc: convert to .docx first)
  presentations .pptx           (.ppt: convert to .pptx first)
  pdf           .pdf            (passed through unchanged)

A file that fails to convert is skipped with a warning; the merged PDF is
still produced from the rest. The exit code is non-zero only when no file
could be converted at all.

ENVIRONMENT VARIABLES:
  DOCFUSE_OUTPUT       Output path (same as -o)
  DOCFUSE_CONCURRENCY  Parallel render workers
  DOCFUSE_TIMEOUT      Per-file render timeout in seconds
  RUST_LOG             Tracing filter (e.g. docfuse=debug)
"#;

/// Merge images, Office documents, and PDFs into a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "docfuse",
    version,
    about = "Merge images, Office documents, and PDFs into a single PDF",
    long_about = "Convert mixed input files (images, docx, xlsx, pptx, existing PDFs) to PDF and \
merge them into one document, preserving argument order. Files that fail to convert are \
reported and skipped; the rest still merge.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files, merged in this order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF path.
    #[arg(short, long, env = "DOCFUSE_OUTPUT", default_value = "merged.pdf")]
    output: PathBuf,

    /// Page size for generated pages: a4, letter, or WIDTHxHEIGHT in points.
    #[arg(long, env = "DOCFUSE_PAGE_SIZE", default_value = "a4")]
    page_size: String,

    /// Margin around generated page content, in points.
    #[arg(long, env = "DOCFUSE_MARGIN", default_value_t = 36.0)]
    margin: f32,

    /// JPEG quality (1-100) for embedded raster images.
    #[arg(long, env = "DOCFUSE_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Body text size in points for generated text pages.
    #[arg(long, env = "DOCFUSE_FONT_SIZE", default_value_t = 11.0)]
    font_size: f32,

    /// Number of files rendered in parallel. Default: CPU cores.
    #[arg(short, long, env = "DOCFUSE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-file render timeout in seconds.
    #[arg(long, env = "DOCFUSE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Print a JSON per-file report to stdout.
    #[arg(long, env = "DOCFUSE_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCFUSE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCFUSE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCFUSE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(cli.inputs.len());
        Some(cb as Arc<dyn JobProgressCallback>)
    } else {
        None
    };

    let mut builder = JobConfig::builder()
        .page_size(parse_page_size(&cli.page_size)?)
        .margin_pt(cli.margin)
        .jpeg_quality(cli.jpeg_quality)
        .font_size_pt(cli.font_size)
        .render_timeout_secs(cli.timeout);
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run the job ──────────────────────────────────────────────────────
    let output = convert_files(&cli.inputs, &config)
        .await
        .context("Conversion failed")?;

    write_output(&cli.output, &output.pdf_bytes)
        .await
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    if cli.json {
        let report = serde_json::json!({
            "output": cli.output,
            "results": output.results,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} files  {} pages  {}ms  →  {}",
            if output.stats.failed_files == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.converted_files,
            output.stats.requested_files,
            output.stats.total_pages,
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        for result in output.results.iter().filter(|r| !r.succeeded()) {
            eprintln!(
                "   {} {}  {}",
                red("skipped"),
                result.original_name,
                dim(&result.error.as_ref().map(|e| e.to_string()).unwrap_or_default()),
            );
        }
    }

    Ok(())
}

/// Cap `msg` at `max` characters, ellipsised. Error messages embed
/// user-supplied file names, so this must cut on character boundaries,
/// never on raw bytes.
fn truncate_message(msg: &str, max: usize) -> String {
    if msg.chars().count() <= max {
        return msg.to_string();
    }
    let head: String = msg.chars().take(max.saturating_sub(1)).collect();
    format!("{head}\u{2026}")
}

/// Parse `--page-size` into a [`PageSize`].
fn parse_page_size(s: &str) -> Result<PageSize> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "a4" => Ok(PageSize::A4),
        "letter" => Ok(PageSize::Letter),
        custom => {
            let (w, h) = custom
                .split_once('x')
                .context("Page size must be a4, letter, or WIDTHxHEIGHT in points")?;
            let width_pt: f32 = w.trim().parse().context("Invalid page width")?;
            let height_pt: f32 = h.trim().parse().context("Invalid page height")?;
            Ok(PageSize::Custom {
                width_pt,
                height_pt,
            })
        }
    }
}
