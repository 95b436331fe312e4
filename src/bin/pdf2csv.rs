//! CLI binary for edgequake-pdf2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, renders progress and wires Ctrl-C to the stop signal.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2csv::{
    convert_cancellable, inspect, CancellationToken, ConversionConfig, ExtractionFailure, Locale,
    PageProgress, PageRange, PageSelection, ProgressSink, ResultTable, RunPhase, RunState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

fn secs(d: Duration) -> String {
    format!("{:.1}s", d.as_secs_f64())
}

fn clock(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress sink: a live bar with elapsed time and the run's own
/// remaining-time estimate, plus one log line per page.
struct CliProgress {
    bar: ProgressBar,
    /// Page number of the most recent extraction failure, 0 if none.
    last_failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            last_failed: AtomicUsize::new(0),
        })
    }
}

impl ProgressSink for CliProgress {
    fn on_run_start(&self, pages_total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(pages_total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.set_message("");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting conversion of {pages_total} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _pages_total: usize) {
        self.bar.set_prefix(format!("Page {page_num}"));
    }

    fn on_page_complete(&self, progress: &PageProgress, table: &ResultTable) {
        if self.last_failed.load(Ordering::SeqCst) != progress.page_num {
            self.bar.println(format!(
                "  {} Page {:>3}  {:<16}  {}",
                green("✓"),
                progress.page_num,
                dim(&format!("{:>5} rows total", table.len())),
                dim(&secs(progress.last_page_duration)),
            ));
        }
        self.bar.set_position(progress.pages_processed as u64);
        if progress.phase == RunPhase::Stopping {
            self.bar.set_message("stopping after this page…");
        } else {
            self.bar
                .set_message(format!("ETA {}", clock(progress.estimated_remaining)));
        }
    }

    fn on_page_error(&self, page_num: usize, _pages_total: usize, failure: &ExtractionFailure) {
        self.last_failed.store(page_num, Ordering::SeqCst);

        let detail: String = failure.detail.chars().take(79).collect();
        let msg = if detail.len() < failure.detail.len() {
            format!("{detail}\u{2026}")
        } else {
            detail
        };
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            red("✗"),
            page_num,
            red(&format!("{:?}", failure.kind)),
            red(&msg),
        ));
    }

    fn on_run_finished(&self, state: &RunState) {
        self.bar.finish_and_clear();
        let mark = match state.phase {
            RunPhase::Completed if state.failed_pages == 0 => green("✔"),
            RunPhase::Completed => cyan("⚠"),
            _ => red("✘"),
        };
        eprintln!(
            "{} {:?}: {}/{} pages, {} with rows, {} failed, {}",
            mark,
            state.phase,
            state.pages_processed,
            state.pages_total,
            state.pages_with_rows,
            state.failed_pages,
            clock(state.elapsed),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole document, Polish captions, CSV on stdout
  pdf2csv register.pdf

  # Write to a file
  pdf2csv register.pdf -o register.csv

  # Pages 3 to 10 with English instruction and captions
  pdf2csv --pages 3-10 --locale en register.pdf -o register.csv

  # Same range, spelled out
  pdf2csv --start-page 3 --end-page 10 register.pdf

  # Paid tier: no need to pace at 10 requests/minute
  pdf2csv --delay-ms 1000 register.pdf -o register.csv

  # Page count only (no API key needed)
  pdf2csv --inspect-only register.pdf

  # Table, run state and token stats as JSON
  pdf2csv --json register.pdf > register.json

Ctrl-C stops after the page in flight; the rows gathered so far are still
written.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  PDF2CSV_API_KEY         API key for the selected provider
  PDF2CSV_PROVIDER        Provider name (gemini, openai, anthropic, …)
  PDF2CSV_MODEL           Model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium
"#;

/// Convert tabular PDF registers to CSV using a multimodal LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2csv",
    version,
    about = "Convert tabular PDF registers to CSV using a multimodal LLM",
    long_about = "Split a PDF into single pages, send each page to a multimodal LLM with a fixed \
extraction instruction and merge the CSV replies into one nine-column table. Pages are processed \
one at a time with a fixed pause in between to stay under the provider's rate limit.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write CSV to this file instead of stdout.
    #[arg(short, long, env = "PDF2CSV_OUTPUT")]
    output: Option<PathBuf>,

    /// Page range: all, 5, or 3-15.
    #[arg(long, env = "PDF2CSV_PAGES", conflicts_with_all = ["start_page", "end_page"])]
    pages: Option<String>,

    /// First page to convert (1-based). Defaults to 1.
    #[arg(long)]
    start_page: Option<usize>,

    /// Last page to convert (inclusive). Defaults to the last page.
    #[arg(long)]
    end_page: Option<usize>,

    /// Language of the instruction and of the CSV header.
    #[arg(long, env = "PDF2CSV_LOCALE", value_enum, default_value = "pl")]
    locale: LocaleArg,

    /// LLM model ID.
    #[arg(long, env = "PDF2CSV_MODEL", default_value = edgequake_pdf2csv::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: gemini, openai, anthropic, mistral, …
    #[arg(long, env = "PDF2CSV_PROVIDER", default_value = edgequake_pdf2csv::config::DEFAULT_PROVIDER)]
    provider: String,

    /// API key for the provider. Falls back to the provider's own variable.
    #[arg(long, env = "PDF2CSV_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pause between two extraction calls, in milliseconds.
    #[arg(long, env = "PDF2CSV_DELAY_MS", default_value_t = 6000)]
    delay_ms: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2CSV_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2CSV_MAX_TOKENS", default_value_t = 65_536)]
    max_tokens: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2CSV_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Output structured JSON (table, run state, stats) instead of CSV.
    #[arg(long, env = "PDF2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Print the page count only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2CSV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LocaleArg {
    Pl,
    En,
}

impl From<LocaleArg> for Locale {
    fn from(v: LocaleArg) -> Self {
        match v {
            LocaleArg::Pl => Locale::Pl,
            LocaleArg::En => Locale::En,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports every page, so library logs are
    // limited to errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let progress = show_progress.then(CliProgress::new);
    let config = build_config(&cli, progress.clone())?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise document info")?
            );
        } else {
            println!("File:   {}", info.source);
            println!("Pages:  {}", info.page_count);
            println!("Bytes:  {}", info.byte_len);
        }
        return Ok(());
    }

    // ── Stop signal ──────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let quiet = cli.quiet;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                if !quiet {
                    eprintln!("{} stop requested, finishing the current page…", cyan("◆"));
                }
                cancel.cancel();
            }
        });
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_cancellable(&cli.input, &config, &cancel)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        match cli.output {
            Some(ref path) => std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{json}"),
        }
    } else if let Some(ref path) = cli.output {
        output
            .table
            .write_csv(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        io::stdout()
            .lock()
            .write_all(output.csv().as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        if progress.is_none() && !cli.json {
            eprintln!(
                "{:?}: {}/{} pages, {} failed",
                output.state.phase,
                output.state.pages_processed,
                output.state.pages_total,
                output.state.failed_pages
            );
        }
        if !cli.json {
            let target = cli
                .output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default();
            eprintln!(
                "   {} rows  {} tokens in  /  {} tokens out  {}ms{}",
                bold(&output.stats.rows.to_string()),
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
                target,
            );
        }
        if output.state.phase == RunPhase::CompletedEmpty {
            eprintln!("{} no rows were extracted from any page", red("✘"));
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<Arc<CliProgress>>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .locale(cli.locale.into())
        .model(&cli.model)
        .provider_name(&cli.provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .inter_page_delay(Duration::from_millis(cli.delay_ms))
        .download_timeout_secs(cli.download_timeout);

    builder = match page_selection(cli)? {
        PageSelection::All => builder,
        PageSelection::Range(range) => builder.pages(range),
        PageSelection::From(start) => builder.pages_from(start),
    };
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(sink) = progress {
        builder = builder.progress_sink(sink);
    }

    builder.build().context("Invalid configuration")
}

/// Resolve `--pages` or `--start-page`/`--end-page` into a page selection.
///
/// `--start-page` alone runs to the last page of the document.
fn page_selection(cli: &Cli) -> Result<PageSelection> {
    if let Some(ref pages) = cli.pages {
        return Ok(parse_pages(pages)?.map_or(PageSelection::All, PageSelection::Range));
    }
    Ok(match (cli.start_page, cli.end_page) {
        (None, None) => PageSelection::All,
        (start, Some(end)) => PageSelection::Range(PageRange::new(start.unwrap_or(1), end)),
        (Some(start), None) => PageSelection::From(start),
    })
}

/// Parse `--pages`: `all`, `N` or `N-M`.
fn parse_pages(s: &str) -> Result<Option<PageRange>> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(None);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(Some(PageRange::new(start, end)));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(Some(PageRange::new(page, page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pages_forms() {
        assert_eq!(parse_pages("all").unwrap(), None);
        assert_eq!(parse_pages(" ALL ").unwrap(), None);
        assert_eq!(parse_pages("5").unwrap(), Some(PageRange::new(5, 5)));
        assert_eq!(parse_pages("3-15").unwrap(), Some(PageRange::new(3, 15)));
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-2").is_err());
        assert!(parse_pages("1,3").is_err());
    }

    #[test]
    fn start_and_end_flags() {
        let cli = Cli::parse_from(["pdf2csv", "--start-page", "2", "--end-page", "4", "x.pdf"]);
        assert_eq!(
            page_selection(&cli).unwrap(),
            PageSelection::Range(PageRange::new(2, 4))
        );

        let cli = Cli::parse_from(["pdf2csv", "--end-page", "4", "x.pdf"]);
        assert_eq!(
            page_selection(&cli).unwrap(),
            PageSelection::Range(PageRange::new(1, 4))
        );

        let cli = Cli::parse_from(["pdf2csv", "x.pdf"]);
        assert_eq!(page_selection(&cli).unwrap(), PageSelection::All);
    }

    #[test]
    fn start_page_alone_runs_to_the_end() {
        let cli = Cli::parse_from(["pdf2csv", "--start-page", "3", "x.pdf"]);
        assert_eq!(page_selection(&cli).unwrap(), PageSelection::From(3));

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.pages.resolve(10), PageRange::new(3, 10));
    }

    #[test]
    fn pages_conflicts_with_start_page() {
        assert!(
            Cli::try_parse_from(["pdf2csv", "--pages", "1-2", "--start-page", "1", "x.pdf"])
                .is_err()
        );
    }

    #[test]
    fn clock_format() {
        assert_eq!(clock(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(secs(Duration::from_millis(1500)), "1.5s");
    }
}
