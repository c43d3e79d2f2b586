//! CLI binary for edgequake-refine.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CorrectionConfig`, runs a pass over one document file and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_refine::{
    correct_document, load_document, save_document, BlockId, CellGeometry, CorrectionConfig,
    CorrectionProgressCallback, OutcomeStatus, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

/// Terminal progress callback: a live bar plus one log line per block.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<BlockId, Instant>>,
    rejected: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Collecting blocks…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            rejected: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} blocks  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Correcting");
    }

    fn elapsed(&self, block: &BlockId) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(block)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl CorrectionProgressCallback for CliProgressCallback {
    fn on_correction_start(&self, total_blocks: usize) {
        self.activate_bar(total_blocks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Correcting {total_blocks} blocks…"))
        ));
    }

    fn on_block_start(&self, block: &BlockId, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(*block, Instant::now());
        self.bar.set_message(block.to_string());
    }

    fn on_block_error(&self, block: &BlockId, error: &str) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<28}  {}  {}",
            red("✗"),
            block.to_string(),
            red(&msg),
            self.elapsed(block),
        ));
    }

    fn on_block_complete(&self, block: &BlockId, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Corrected => self.bar.println(format!(
                "  {} {:<28}  {}",
                green("✓"),
                block.to_string(),
                self.elapsed(block)
            )),
            OutcomeStatus::Unchanged => self.bar.println(format!(
                "  {} {:<28}  {}  {}",
                dim("="),
                block.to_string(),
                dim("no corrections"),
                self.elapsed(block)
            )),
            OutcomeStatus::Skipped | OutcomeStatus::Rejected => {}
        }
        self.bar.inc(1);
    }

    fn on_correction_complete(&self, total_blocks: usize, corrected: usize) {
        self.bar.finish_and_clear();
        let rejected = self.rejected.load(Ordering::SeqCst);
        if rejected == 0 {
            eprintln!(
                "{} {}/{} blocks corrected",
                green("✔"),
                bold(&corrected.to_string()),
                total_blocks
            );
        } else {
            eprintln!(
                "{} {}/{} blocks corrected  ({} rejected)",
                cyan("⚠"),
                bold(&corrected.to_string()),
                total_blocks,
                red(&rejected.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Correct a document, write the result next to it
  refine doc.json -o doc.corrected.json

  # Only tables, with a specific model
  refine --no-handwriting --provider openai --model gpt-4.1 doc.json -o out.json

  # Print the per-block report as JSON
  refine --json doc.json -o out.json > report.json

  # Cell boxes spread across the table instead of unit offsets
  refine --cell-geometry proportional doc.json -o out.json

INPUT FORMAT:
  A JSON document: { "pages": [ { "page_id", "size", "image_path", "blocks", "structure" } ] }.
  `image_path` is resolved relative to the document file. Pages without an
  image are corrected from text alone.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Correct tables, equations and handwriting in extracted documents using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "refine",
    version,
    about = "Correct tables, equations and handwriting in extracted documents using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document JSON file.
    input: PathBuf,

    /// Write the corrected document here instead of stdout.
    #[arg(short, long, env = "REFINE_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the per-block report (JSON) to this file.
    #[arg(long, env = "REFINE_REPORT")]
    report: Option<PathBuf>,

    /// Print the per-block report as JSON on stdout. Requires --output.
    #[arg(long, env = "REFINE_JSON", requires = "output")]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent model calls.
    #[arg(short, long, env = "REFINE_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Max LLM output tokens per block.
    #[arg(long, env = "REFINE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REFINE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per block on transport failure.
    #[arg(long, env = "REFINE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "REFINE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Fraction of a block's size added around its image crop.
    #[arg(long, env = "REFINE_IMAGE_EXPANSION", default_value_t = 0.01)]
    image_expansion: f32,

    /// How rebuilt table cells get their bounding boxes.
    #[arg(long, env = "REFINE_CELL_GEOMETRY", value_enum, default_value = "offset")]
    cell_geometry: GeometryArg,

    /// Skip the handwriting / equation processor.
    #[arg(long)]
    no_handwriting: bool,

    /// Skip the table processor.
    #[arg(long)]
    no_tables: bool,

    /// Tables with more rows than this are left alone.
    #[arg(long, env = "REFINE_MAX_TABLE_ROWS", default_value_t = 75)]
    max_table_rows: usize,

    /// Only correct tables that already have cells.
    #[arg(long)]
    require_cells: bool,

    /// File with a custom handwriting prompt (must contain {extracted_text}).
    #[arg(long)]
    handwriting_prompt: Option<PathBuf>,

    /// File with a custom table prompt (must contain {block_html}).
    #[arg(long)]
    table_prompt: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "REFINE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REFINE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "REFINE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum GeometryArg {
    Offset,
    Proportional,
}

impl From<GeometryArg> for CellGeometry {
    fn from(v: GeometryArg) -> Self {
        match v {
            GeometryArg::Offset => CellGeometry::GridOffset,
            GeometryArg::Proportional => CellGeometry::Proportional,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.output.is_some();
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CorrectionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run correction ───────────────────────────────────────────────────
    let mut doc = load_document(&cli.input)
        .await
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    let report = correct_document(&mut doc, &config)
        .await
        .context("Correction failed")?;

    match cli.output {
        Some(ref path) => save_document(&doc, path)
            .await
            .context("Failed to write corrected document")?,
        None => {
            let json = serde_json::to_string_pretty(&doc).context("Failed to serialise document")?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
    }

    if let Some(ref path) = cli.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let stats = &report.stats;
    if !cli.quiet && !cli.json {
        if let Some(ref path) = cli.output {
            eprintln!(
                "{}  {} corrected · {} unchanged · {} rejected · {} skipped  {}ms  →  {}",
                if stats.rejected == 0 { green("✔") } else { cyan("⚠") },
                stats.corrected,
                stats.unchanged,
                stats.rejected,
                stats.skipped,
                stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `CorrectionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CorrectionConfig> {
    let mut builder = CorrectionConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .image_expansion_ratio(cli.image_expansion)
        .cell_geometry(cli.cell_geometry.clone().into())
        .handwriting_enabled(!cli.no_handwriting)
        .table_enabled(!cli.no_tables)
        .max_table_rows(cli.max_table_rows);

    if let Some(ref path) = cli.handwriting_prompt {
        builder = builder.handwriting_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.table_prompt {
        builder = builder.table_prompt(read_prompt(path).await?);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;
    config.table.require_cells = cli.require_cells;
    Ok(config)
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}
