//! CLI binary for edgequake-text2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, prints results, or starts the HTTP service.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_text2md::pipeline::input::read_input;
use edgequake_text2md::{
    server, suggest_improvements, suggest_titles, write_markdown, CancelToken,
    ConversionConfig, ConversionOutput, ConversionProgressCallback, Converter, InstructionKind,
    ProgressCallback, SectionBudget,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::SocketAddr;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per pass plus a log line per section.
/// Sections finish out of order, so start times are tracked per index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<(InstructionKind, usize), Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until the first pass reports its section count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, kind: InstructionKind, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sections  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(kind.to_string());
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, kind: InstructionKind, index: usize) -> u128 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&(kind, index)))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_pass_start(&self, kind: InstructionKind, total_sections: usize) {
        self.activate_bar(kind, total_sections);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{kind} pass: {total_sections} section(s)…"))
        ));
    }

    fn on_section_start(&self, kind: InstructionKind, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert((kind, index), Instant::now());
        }
        self.bar.set_message(format!("section {}", index + 1));
    }

    fn on_section_complete(
        &self,
        kind: InstructionKind,
        index: usize,
        total: usize,
        markdown_len: usize,
    ) {
        let elapsed_ms = self.elapsed_ms(kind, index);
        self.bar.println(format!(
            "  {} Section {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, kind: InstructionKind, index: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(kind, index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Section {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, markdown_len: usize, refined: bool) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chars of Markdown{}",
            green("✔"),
            bold(&markdown_len.to_string()),
            if refined { dim(" (refined)") } else { String::new() },
        );
    }
}

impl CliProgressCallback {
    /// Clear the bar after a failed conversion.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
        let errors = self.errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!("{} {} section(s) failed", red("✘"), errors);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  text2md notes.txt

  # Convert to file
  text2md notes.txt -o notes.md

  # Read from stdin
  pbpaste | text2md -

  # Smaller sections, more parallelism
  text2md --budget-tokens 2000 --concurrency 10 transcript.txt -o transcript.md

  # Convert from URL, skip the refinement pass
  text2md --no-refine https://example.com/README.txt

  # Also suggest titles and improvements, as JSON
  text2md --titles --suggestions --json notes.txt > notes.json

  # Run the HTTP service
  text2md --serve 127.0.0.1:8080

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. edgequake_text2md=debug)

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Convert:         text2md notes.txt -o notes.md
"#;

/// Convert unstructured text files and URLs to Markdown using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "text2md",
    version,
    about = "Convert unstructured text files and URLs to Markdown using LLMs",
    long_about = "Convert plain text (local files, URLs or stdin) to clean, well-structured \
Markdown. Code blocks, headers and list items are protected, the text is split into \
sections, each section is converted concurrently, and long results get a refinement pass. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local text file path, HTTP/HTTPS URL, or `-` for stdin.
    #[arg(required_unless_present = "serve")]
    input: Option<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "TEXT2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Section budget in estimated tokens.
    #[arg(long, env = "TEXT2MD_BUDGET_TOKENS", conflicts_with = "budget_chars")]
    budget_tokens: Option<usize>,

    /// Section budget in characters.
    #[arg(long, env = "TEXT2MD_BUDGET_CHARS")]
    budget_chars: Option<usize>,

    /// Refine when the first-pass output exceeds this many chars.
    #[arg(long, env = "TEXT2MD_REFINE_THRESHOLD", default_value_t = 10_000)]
    refine_threshold: usize,

    /// Never run the refinement pass.
    #[arg(long, env = "TEXT2MD_NO_REFINE")]
    no_refine: bool,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "TEXT2MD_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Attempts per section before giving up.
    #[arg(long, env = "TEXT2MD_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Base retry delay in milliseconds, doubled per attempt.
    #[arg(long, env = "TEXT2MD_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "TEXT2MD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TEXT2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TEXT2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "TEXT2MD_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Path to a text file whose contents replace the built-in section
    /// conversion instructions (refinement and assist prompts are unchanged).
    #[arg(long, env = "TEXT2MD_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Also suggest titles for the converted document.
    #[arg(long)]
    titles: bool,

    /// Also suggest improvements for the converted document.
    #[arg(long)]
    suggestions: bool,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long, env = "TEXT2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEXT2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEXT2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEXT2MD_QUIET")]
    quiet: bool,

    /// Serve the HTTP API on this address instead of converting.
    #[arg(long, env = "TEXT2MD_SERVE", value_name = "ADDR")]
    serve: Option<SocketAddr>,
}

/// JSON report: the conversion output plus any requested suggestions.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    output: &'a ConversionOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    titles: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestions: Option<&'a [String]>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs when it is shown.
    let show_progress = cli.serve.is_none() && !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress = if show_progress {
        Some(CliProgressCallback::new_dynamic())
    } else {
        None
    };

    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )
    .await?;
    let converter = Converter::new(config).context("Failed to configure LLM provider")?;

    // ── Service mode ─────────────────────────────────────────────────────
    if let Some(addr) = cli.serve {
        server::serve(addr, Arc::new(converter))
            .await
            .context("HTTP service failed")?;
        return Ok(());
    }

    let input = cli.input.as_deref().unwrap_or("-");
    let text = read_input(input, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to read {input}"))?;

    // Ctrl-C cancels in-flight model calls.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match converter.convert_with_cancel(&text, &cancel).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.abandon();
            }
            return Err(e).context("Conversion failed");
        }
    };

    let titles = if cli.titles {
        Some(
            suggest_titles(converter.client(), &output.markdown)
                .await
                .context("Title suggestion failed")?,
        )
    } else {
        None
    };
    let suggestions = if cli.suggestions {
        Some(
            suggest_improvements(converter.client(), &output.markdown)
                .await
                .context("Improvement suggestion failed")?,
        )
    } else {
        None
    };

    if cli.json {
        let report = Report {
            output: &output,
            titles: titles.as_deref(),
            suggestions: suggestions.as_deref(),
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        match cli.output {
            Some(ref path) => tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{json}"),
        }
        return Ok(());
    }

    if let Some(ref output_path) = cli.output {
        write_markdown(output_path, &output.markdown)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} sections  {}ms  →  {}",
                green("✔"),
                output.stats.total_sections,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_list("Suggested titles", titles.as_deref());
        print_list("Suggested improvements", suggestions.as_deref());
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {} model call(s), {} cached",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_attempts,
            output.stats.cached_sections,
        );
        if output.stats.unresolved_placeholders > 0 {
            eprintln!(
                "   {} {} placeholder(s) in the input could not be resolved",
                cyan("⚠"),
                output.stats.unresolved_placeholders
            );
        }
    }

    Ok(())
}

fn print_list(heading: &str, items: Option<&[String]>) {
    if let Some(items) = items {
        eprintln!("{}", bold(heading));
        for item in items {
            eprintln!("  • {item}");
        }
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let budget = match (cli.budget_tokens, cli.budget_chars) {
        (_, Some(chars)) => SectionBudget::Chars(chars),
        (Some(tokens), None) => SectionBudget::Tokens(tokens),
        (None, None) => SectionBudget::default(),
    };

    let mut builder = ConversionConfig::builder()
        .section_budget(budget)
        .refine_threshold_chars(cli.refine_threshold)
        .enable_refinement(!cli.no_refine)
        .concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.instruction {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.custom_instruction(instruction);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
