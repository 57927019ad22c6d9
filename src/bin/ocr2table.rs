//! CLI binary for ocr2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, sets up logging and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2table::{
    convert_dir, BatchOutput, BatchProgressCallback, ConversionConfig, Credential, FailurePolicy,
    ProgressCallback, TencentConfig, TencentOcr,
};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

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

/// Terminal progress callback: a live bar plus one log line per file.
/// Files may finish out of order when several workers run.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<PathBuf, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, source: &Path) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(source))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, source: &Path) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(source.to_path_buf(), Instant::now());
        }
        self.bar.set_message(source.display().to_string());
    }

    fn on_file_complete(&self, source: &Path, output: &Path, bytes: u64) {
        let secs = self.elapsed_secs(source);
        self.bar.println(format!(
            "  {} {}  →  {}  {}  {}",
            green("✓"),
            source.display(),
            output.display(),
            dim(&format!("{bytes:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, source: &Path, error: &str) {
        let secs = self.elapsed_secs(source);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(79) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            source.display(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert ./tables into ./output
  ocr2table

  # Other directories, more logging
  ocr2table --input scans --output sheets --debug

  # Second page of every PDF, retry rate-limited calls twice
  ocr2table --pdf-page 2 --max-retries 2

  # Leave no placeholder sheets for failed files
  ocr2table --on-failure skip

  # Machine-readable report
  ocr2table --json > report.json

SUPPORTED INPUTS:
  .png .jpg .jpeg .bmp .pdf (case-sensitive); every other file is ignored.
  The base64 payload of a file must not exceed 7 MiB (≈ 5 MiB on disk).

ENVIRONMENT VARIABLES:
  TC_SECRET_ID        Tencent Cloud API SecretId
  TC_SECRET_KEY       Tencent Cloud API SecretKey
  TC_REGION           Region for OCR requests (default ap-beijing)
  RUST_LOG            Overrides the log filter (e.g. ocr2table=debug)

SETUP:
  1. Create an API key: https://console.cloud.tencent.com/cam/capi
  2. export TC_SECRET_ID=... TC_SECRET_KEY=...
  3. Put scans in ./tables and run: ocr2table
"#;

/// Convert scanned tables to spreadsheets with Tencent Cloud table OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2table",
    version,
    about = "Convert a directory of scanned tables (images/PDFs) into .xlsx spreadsheets",
    long_about = "Walks an input directory for PNG, JPEG, BMP and PDF scans, submits each to \
Tencent Cloud's RecognizeTableOCR service and writes one spreadsheet per scan into the output \
directory. A failing file is logged and does not stop the batch.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory to scan for tables.
    #[arg(short, long, env = "OCR2TABLE_INPUT", default_value = "tables")]
    input: PathBuf,

    /// Directory receiving the spreadsheets (created if absent).
    #[arg(short, long, env = "OCR2TABLE_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Enable DEBUG-level logs.
    #[arg(short, long, alias = "verbose", short_alias = 'v', env = "OCR2TABLE_DEBUG")]
    debug: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2TABLE_QUIET")]
    quiet: bool,

    /// Number of files recognised concurrently.
    #[arg(short, long, env = "OCR2TABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF page to recognise (1-indexed; the provider defaults to page 1).
    #[arg(long, env = "OCR2TABLE_PDF_PAGE")]
    pdf_page: Option<u32>,

    /// Extra attempts for rate-limited or transient failures.
    #[arg(long, env = "OCR2TABLE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "OCR2TABLE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Maximum base64 payload per file, in bytes.
    #[arg(long, env = "OCR2TABLE_MAX_PAYLOAD", default_value_t = ocr2table::config::DEFAULT_MAX_PAYLOAD_BYTES)]
    max_payload: u64,

    /// What to leave behind for a failed file.
    #[arg(long, env = "OCR2TABLE_ON_FAILURE", value_enum, default_value = "placeholder")]
    on_failure: FailureArg,

    /// Source extensions to pick up (comma-separated, case-sensitive).
    #[arg(long, env = "OCR2TABLE_EXTENSIONS", value_delimiter = ',',
          default_value = "png,jpg,jpeg,bmp,pdf")]
    extensions: Vec<String>,

    /// Extension of the written files.
    #[arg(long, env = "OCR2TABLE_OUTPUT_EXTENSION", default_value = "xlsx")]
    output_extension: String,

    /// Tencent Cloud SecretId.
    #[arg(long, env = "TC_SECRET_ID", hide_env_values = true)]
    secret_id: Option<String>,

    /// Tencent Cloud SecretKey.
    #[arg(long, env = "TC_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Region OCR requests are routed to.
    #[arg(long, env = "TC_REGION", default_value = "ap-beijing")]
    region: String,

    /// OCR API host.
    #[arg(long, env = "TC_ENDPOINT", default_value = "ocr.tencentcloudapi.com")]
    endpoint: String,

    /// Log file (default: next to the executable, with a .log extension).
    #[arg(long, env = "OCR2TABLE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log to the terminal only.
    #[arg(long)]
    no_log_file: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "OCR2TABLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2TABLE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FailureArg {
    Placeholder,
    Skip,
    Abort,
}

impl From<FailureArg> for FailurePolicy {
    fn from(v: FailureArg) -> Self {
        match v {
            FailureArg::Placeholder => FailurePolicy::Placeholder,
            FailureArg::Skip => FailurePolicy::Skip,
            FailureArg::Abort => FailurePolicy::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    init_logging(&cli, show_progress)?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    tracing::debug!("{:?}", config);

    let output = convert_dir(&config).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    }
    if !cli.quiet {
        print_summary(&output, &config.output_dir, show_progress);
    }

    Ok(())
}

/// Terminal + file logging.
///
/// `RUST_LOG` wins; otherwise `debug` with `--debug`, else `info`. While the
/// progress bar is drawn the terminal only gets errors, the log file still
/// gets everything.
fn init_logging(cli: &Cli, show_progress: bool) -> Result<()> {
    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_level = if cli.quiet || (show_progress && !cli.debug) {
        LevelFilter::ERROR
    } else {
        LevelFilter::TRACE
    };
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_filter(stderr_level);

    let log_path = if cli.no_log_file {
        None
    } else {
        match cli.log_file.clone() {
            Some(path) => Some(path),
            None => std::env::current_exe().ok().map(|exe| exe.with_extension("log")),
        }
    };
    let mut open_error = None;
    let file_layer = log_path.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                open_error = Some(format!("{}: {}", path.display(), e));
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    if let Some(err) = open_error {
        tracing::warn!("Log file disabled, cannot open {}", err);
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .input_dir(&cli.input)
        .output_dir(&cli.output)
        .extensions(cli.extensions.iter().map(|e| e.trim().to_string()))
        .output_extension(cli.output_extension.clone())
        .max_payload_bytes(cli.max_payload)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .failure_policy(cli.on_failure.clone().into());

    if let Some(page) = cli.pdf_page {
        builder = builder.pdf_page(page);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    // Without credentials the library reports the missing keys itself, and
    // only if there is something to convert.
    if let (Some(id), Some(key)) = (cli.secret_id.as_deref(), cli.secret_key.as_deref()) {
        if !id.is_empty() && !key.is_empty() {
            let provider = TencentOcr::new(
                Credential::new(id, key),
                TencentConfig {
                    endpoint: cli.endpoint.clone(),
                    region: cli.region.clone(),
                    timeout_secs: cli.api_timeout,
                },
            )
            .context("Failed to set up the OCR client")?;
            builder = builder.recognizer(Arc::new(provider));
        }
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &BatchOutput, output_dir: &Path, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        eprintln!(
            "{}  {}/{} files  {}ms  →  {}",
            if stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.succeeded,
            stats.discovered,
            stats.total_duration_ms,
            bold(&output_dir.display().to_string()),
        );
    }
    for failed in output.failures() {
        let error = failed
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        eprintln!("   {} {}: {}", red("✗"), failed.source.display(), dim(&error));
    }
    if stats.placeholders > 0 {
        eprintln!(
            "   {} empty placeholder sheets written",
            dim(&stats.placeholders.to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn debug_has_short_and_long_spellings() {
        for flag in ["-d", "-v", "--debug", "--verbose"] {
            let cli = Cli::try_parse_from(["ocr2table", flag]).unwrap();
            assert!(cli.debug, "{flag}");
        }
    }

    #[test]
    fn on_failure_maps_to_policy() {
        let cli = Cli::try_parse_from(["ocr2table", "--on-failure", "skip"]).unwrap();
        assert_eq!(FailurePolicy::from(cli.on_failure), FailurePolicy::Skip);
    }
}
