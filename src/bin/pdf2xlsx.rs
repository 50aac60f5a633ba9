//! CLI binary for edgequake-pdf2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2xlsx::{
    inspect, process_pdf_tables, ExtractionConfig, ExtractionMethod, OcrSettings, PageSelection,
    ProgressReporter, ReportLevel,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress reporter using indicatif ────────────────────────────────────

/// Terminal reporter: one bar for the page walk, reused for the table
/// normalisation pass, with per-page and per-table log lines above it.
struct CliReporter {
    bar: ProgressBar,
    pages_seen: AtomicUsize,
}

impl CliReporter {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages_seen: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, prefix: &'static str, unit: &str, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

impl ProgressReporter for CliReporter {
    fn on_message(&self, level: ReportLevel, message: &str) {
        let marker = match level {
            ReportLevel::Info => dim("·"),
            ReportLevel::Warning => yellow("⚠"),
            ReportLevel::Error => red("✗"),
        };
        self.bar.println(format!("{marker} {message}"));
    }

    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar("Extracting", "pages", total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} page(s) for tables…"))
        ));
    }

    fn on_page_start(&self, page: usize, _total_pages: usize) {
        let seen = self.pages_seen.fetch_add(1, Ordering::SeqCst);
        self.bar.set_position(seen as u64);
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_tables(&self, page: usize, method: ExtractionMethod, tables: usize) {
        if tables == 0 {
            return;
        }
        self.bar.println(format!(
            "  {} Page {:>3}  {} table(s)  {}",
            green("✓"),
            page,
            tables,
            dim(&method.to_string()),
        ));
    }

    fn on_page_fallback(&self, page: usize, failed_stage: &str, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}  {} failed, falling back  {}",
            yellow("↳"),
            page,
            failed_stage,
            dim(&truncate(error, 70)),
        ));
    }

    fn on_page_error(&self, page: usize, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            red("✗"),
            page,
            red(&truncate(error, 80)),
        ));
    }

    fn on_table_start(&self, table: usize, total_tables: usize) {
        if table == 1 {
            self.activate_bar("Normalising", "tables", total_tables);
        }
        self.bar.set_message(format!("table {table}"));
    }

    fn on_table_normalized(&self, _table: usize, _total_tables: usize) {
        self.bar.inc(1);
    }

    fn on_table_fallback(&self, table: usize, total_tables: usize, reason: &str) {
        self.bar.println(format!(
            "  {} Table {:>3}/{:<3}  kept as extracted  {}",
            yellow("⚠"),
            table,
            total_tables,
            dim(&truncate(reason, 70)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _tables_written: usize, _success: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every table into a workbook
  pdf2xlsx report.pdf -o report.xlsx

  # Specific pages, no LLM cleanup
  pdf2xlsx --pages 3-7 --no-normalize report.pdf -o tables.xlsx

  # Scanned document: OCR pages where no table was detected
  pdf2xlsx --ocr-empty-pages --ocr-lang eng+deu scan.pdf -o scan.xlsx

  # Use another LLM provider through edgequake-llm
  pdf2xlsx --provider openai --model gpt-4.1-mini report.pdf -o report.xlsx

  # Download and process a PDF from a URL
  pdf2xlsx https://example.com/statement.pdf -o statement.xlsx

  # Inspect PDF metadata (no API key needed)
  pdf2xlsx --inspect-only report.pdf

  # Machine-readable run summary
  pdf2xlsx --json report.pdf -o report.xlsx > summary.json

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default backend)
  EDGEQUAKE_LLM_PROVIDER  Provider for the edgequake-llm backend (openai, gemini, ollama, …)
  EDGEQUAKE_MODEL         Model for the edgequake-llm backend
  RUST_LOG                Log filter, overrides -v / -q

EXTERNAL TOOLS:
  pdfium     Shared library next to the executable, on the library path,
             or in the directory given by --pdfium-dir.
  tesseract  Needed for the OCR fallback (--tesseract to point at it).
"#;

/// Extract tables from PDF files into an Excel workbook.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2xlsx",
    version,
    about = "Extract tables from PDF files and URLs into an Excel workbook",
    long_about = "Extract tables from PDF documents (local files or URLs) into an .xlsx \
workbook with one sheet per table. Tables are detected from the text layer and ruled lines, \
with OCR and raw-text fallbacks, and optionally cleaned up by an LLM.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Workbook to write. Default: <input name>.xlsx in the current directory.
    #[arg(short, long, env = "PDF2XLSX_OUTPUT")]
    output: Option<PathBuf>,

    /// Anthropic API key used for table normalisation.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// LLM model ID (default: claude-3-sonnet-20240229).
    #[arg(long, env = "PDF2XLSX_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDF2XLSX_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens per table.
    #[arg(long, env = "PDF2XLSX_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–1.0).
    #[arg(long, env = "PDF2XLSX_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file replacing the normalisation instruction.
    #[arg(long, env = "PDF2XLSX_PROMPT")]
    prompt: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2XLSX_PAGES", default_value = "all")]
    pages: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2XLSX_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2XLSX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Write tables as extracted, without the LLM pass.
    #[arg(long, env = "PDF2XLSX_NO_NORMALIZE")]
    no_normalize: bool,

    /// Also OCR pages where no table was detected in the text layer.
    #[arg(long, env = "PDF2XLSX_OCR_EMPTY_PAGES")]
    ocr_empty_pages: bool,

    /// Tesseract executable.
    #[arg(long, env = "PDF2XLSX_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, env = "PDF2XLSX_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDF2XLSX_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,

    /// Write every cell as text instead of converting numbers.
    #[arg(long, env = "PDF2XLSX_NO_INFER_NUMBERS")]
    no_infer_numbers: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long, env = "PDF2XLSX_INSPECT_ONLY")]
    inspect_only: bool,

    /// Print the run summary (or metadata) as JSON on stdout.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2XLSX_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2XLSX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-table LLM call timeout in seconds.
    #[arg(long, env = "PDF2XLSX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; warnings still get through.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let reporter: Option<Arc<dyn ProgressReporter>> = if show_progress {
        Some(CliReporter::new() as Arc<dyn ProgressReporter>)
    } else {
        None
    };
    let config = build_config(&cli, reporter).await?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = process_pdf_tables(&cli.input, &output_path, &config)
        .await
        .context("Table extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        let fallback = summary.tables_written() - summary.tables_normalized();
        eprintln!(
            "{}  {} table(s) from {} page(s)  {}ms  →  {}",
            if summary.pages_failed == 0 && (fallback == 0 || cli.no_normalize) {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&summary.tables_written().to_string()),
            summary.pages_scanned,
            summary.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if !cli.no_normalize {
            eprintln!(
                "   {} normalised  /  {} kept as extracted",
                dim(&summary.tables_normalized().to_string()),
                dim(&fallback.to_string()),
            );
        }
        if summary.pages_failed > 0 {
            eprintln!("   {} page(s) skipped", red(&summary.pages_failed.to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    reporter: Option<Arc<dyn ProgressReporter>>,
) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .normalize(!cli.no_normalize)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .ocr_empty_pages(cli.ocr_empty_pages)
        .infer_numbers(!cli.no_infer_numbers)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .ocr(OcrSettings {
            command: cli.tesseract.clone(),
            language: cli.ocr_lang.clone(),
            ..OcrSettings::default()
        });

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref dir) = cli.pdfium_dir {
        builder = builder.pdfium_library_dir(dir.clone());
    }
    if let Some(reporter) = reporter {
        builder = builder.reporter(reporter);
    }

    builder.build().context("Invalid configuration")
}

/// `<input stem>.xlsx` in the current directory.
fn default_output(input: &str) -> PathBuf {
    let name = input
        .rsplit('/')
        .next()
        .map(|last| last.split(['?', '#']).next().unwrap_or(last))
        .and_then(|last| Path::new(last).file_stem().map(|s| s.to_os_string()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "tables".into());
    let mut path = PathBuf::from(name);
    path.set_extension("xlsx");
    path
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
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

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
