//! CLI binary for edgequake-pdftext2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` / `CallOptions` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdftext2md::{
    write_output, CallOptions, ConversionConfig, ConversionConfigBuilder,
    ConversionProgressCallback, Converter, EngineOptions, ExtractionMode, LlmBackend,
    NormalizationRule, OcrOptions, PdfiumRenderer, ProgressCallback, ProgressReport,
    PromptBuilder, Stage, TesseractOcr, DEFAULT_MODEL_ID,
};
use edgequake_pdftext2md::pipeline::input::{resolve_input, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner until the page count is known, then
/// a page bar. Engine initialisation shows its percentage in the message.
///
/// `fast --rewrite` runs two pipelines against one bar, so the bar is only
/// finished on the last `Complete` report.
struct CliProgressCallback {
    bar: ProgressBar,
    completions_left: AtomicUsize,
}

impl CliProgressCallback {
    fn new(pipelines: usize) -> Arc<Self> {
        Self::with_bar(ProgressBar::new(0), pipelines)
    }

    fn with_bar(bar: ProgressBar, pipelines: usize) -> Arc<Self> {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            completions_left: AtomicUsize::new(pipelines.max(1)),
        })
    }

    /// Count one `Complete` report; true when it was the last one expected.
    fn complete_one(&self) -> bool {
        let prev = self
            .completions_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        prev <= 1
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_progress(&self, report: &ProgressReport) {
        if let Some(ref error) = report.error {
            self.bar.println(format!("  {} {}  {}", red("✗"), report.stage, red(error)));
            return;
        }

        match report.stage {
            Stage::Start => {
                if let Some(total) = report.total_pages {
                    self.activate_bar(total);
                }
            }
            Stage::Extract => {
                if let Some(page) = report.current_page {
                    self.bar.set_position(page as u64);
                }
            }
            Stage::Render | Stage::Recognize => {
                if let Some(page) = report.current_page {
                    self.bar.set_position(page.saturating_sub(1) as u64);
                    self.bar.set_message(format!("{} page {}", report.stage, page));
                }
            }
            Stage::OcrInit | Stage::Normalize | Stage::Reconstruct | Stage::EngineUnload => {
                self.bar.set_message(report.message.clone());
            }
            Stage::EngineInit => {
                self.bar.set_prefix("Engine");
                let pct = report.progress.map(|p| (p * 100.0).round() as u32).unwrap_or(0);
                self.bar.set_message(format!("{} {}", report.message, dim(&format!("{pct}%"))));
            }
            Stage::Rewrite => {
                self.bar.set_prefix("Rewriting");
                self.bar.set_message(report.message.clone());
            }
            Stage::Complete => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                if self.complete_one() {
                    self.bar.finish_and_clear();
                    eprintln!("{} {}", green("✔"), bold(&report.message));
                } else {
                    self.bar.println(format!("{} {}", green("✔"), bold(&report.message)));
                }
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text-layer extraction (stdout)
  pdftext2md fast invoice.pdf

  # Scanned document, German OCR, higher raster scale
  pdftext2md ocr scan.pdf --lang deu --scale 3.0 -o scan.md

  # Extra normalisation rules from a JSON file
  pdftext2md fast report.pdf --rules rules.json

  # Convert, then polish with the default model
  pdftext2md fast paper.pdf --rewrite -o paper.md

  # Encrypted document
  pdftext2md fast statement.pdf --password hunter2

  # Rewrite existing Markdown with a local model
  pdftext2md rewrite draft.md --model llama3.2 --model-location ollama

RULES FILE:
  A JSON array of {"pattern": "<regex>", "replacement": "<text>"} objects,
  applied in order after the built-in rules.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default rewrite model)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDFIUM_LIB_PATH         Path to libpdfium (else the system library is used)
  RUST_LOG                Log filter, e.g. edgequake_pdftext2md=debug
"#;

/// Convert PDF text to structured Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdftext2md",
    version,
    about = "Convert PDF text (text layer or OCR) to structured Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFTEXT2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFTEXT2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFTEXT2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the embedded text layer.
    Fast(ConvertArgs),
    /// Rasterise pages and run OCR.
    Ocr {
        #[command(flatten)]
        convert: ConvertArgs,

        /// OCR language (tesseract traineddata name, e.g. eng, deu, eng+fra).
        #[arg(long, env = "PDFTEXT2MD_LANG", default_value = "eng")]
        lang: String,

        /// Page rasterisation scale (0.5–8.0).
        #[arg(long, env = "PDFTEXT2MD_SCALE", default_value_t = 2.5)]
        scale: f32,

        /// Tesseract page segmentation mode.
        #[arg(long, default_value_t = 3)]
        psm: u8,

        /// Path to the tesseract binary (default: looked up on PATH).
        #[arg(long, env = "TESSERACT_PATH")]
        tesseract: Option<PathBuf>,
    },
    /// Rewrite a Markdown file (or stdin with `-`) with a generative model.
    Rewrite {
        /// Markdown file path, or `-` for stdin.
        input: String,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PDFTEXT2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON file with extra normalisation rules.
    #[arg(long, env = "PDFTEXT2MD_RULES")]
    rules: Option<PathBuf>,

    /// Split camelCase / PascalCase words glued together by extraction.
    #[arg(long)]
    split_camel_case: bool,

    /// Output the reconstructed blocks as JSON instead of Markdown.
    #[arg(long, conflicts_with = "rewrite")]
    json: bool,

    /// Polish the converted Markdown with a generative model.
    #[arg(long)]
    rewrite: bool,

    /// Password for encrypted PDFs.
    #[arg(long, env = "PDFTEXT2MD_PASSWORD")]
    password: Option<String>,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Rewrite model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Where the model lives (provider name: openai, anthropic, gemini, ollama, …).
    /// Required for any model other than the default.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    model_location: Option<String>,

    /// Path to a prompt template; `{text}` is replaced with the Markdown.
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, default_value_t = 4096)]
    max_tokens: usize,
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

    let pipelines = match cli.command {
        Command::Fast(ref args) | Command::Ocr { convert: ref args, .. } if args.rewrite => 2,
        _ => 1,
    };
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(pipelines) as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Fast(ref args) => {
            let options = CallOptions::new();
            run_convert(args, ExtractionMode::Direct, options, progress_cb).await
        }
        Command::Ocr {
            ref convert,
            ref lang,
            scale,
            psm,
            ref tesseract,
        } => {
            let options = CallOptions::new()
                .ocr_language(lang.clone())
                .render_scale(scale)
                .ocr_options(OcrOptions {
                    page_segmentation_mode: psm,
                    binary_path: tesseract.clone(),
                    ..OcrOptions::default()
                });
            run_convert(convert, ExtractionMode::Ocr, options, progress_cb).await
        }
        Command::Rewrite {
            ref input,
            ref output,
            ref model,
        } => run_rewrite(input, output.as_deref(), model, progress_cb).await,
    }
}

async fn run_convert(
    args: &ConvertArgs,
    mode: ExtractionMode,
    options: CallOptions,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let config = build_config(args, &args.model, progress).await?;
    let mut renderer = PdfiumRenderer::new();
    if let Some(ref password) = args.password {
        renderer = renderer.with_password(password.clone());
    }
    let converter = Converter::with_engines(
        config,
        Arc::new(renderer),
        Arc::new(TesseractOcr::new()),
        Arc::new(LlmBackend::new()),
    );

    if args.json {
        let bytes = resolve_input(&args.input, DEFAULT_DOWNLOAD_TIMEOUT_SECS)
            .await
            .with_context(|| format!("Failed to load {}", args.input))?;
        let blocks = converter
            .convert_to_blocks(bytes, mode, &options)
            .await
            .context("Conversion failed")?;
        let json = serde_json::to_string_pretty(&blocks).context("Failed to serialise blocks")?;
        return emit(&json, args.output.as_deref()).await;
    }

    let mut markdown = converter
        .convert_file(&args.input, mode, &options)
        .await
        .with_context(|| format!("Failed to convert {}", args.input))?;

    if args.rewrite {
        markdown = converter
            .rewrite(&markdown, &options)
            .await
            .context("Rewrite failed")?;
    }

    emit(&markdown, args.output.as_deref()).await
}

async fn run_rewrite(
    input: &str,
    output: Option<&Path>,
    model: &ModelArgs,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let text = if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {input}"))?
    };

    let mut builder = apply_model_args(ConversionConfig::builder(), model).await?;
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let converter = Converter::new(builder.build().context("Invalid configuration")?);

    let rewritten = converter
        .rewrite(&text, &CallOptions::new())
        .await
        .context("Rewrite failed")?;
    emit(&rewritten, output).await
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(
    args: &ConvertArgs,
    model: &ModelArgs,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder().split_camel_case(args.split_camel_case);

    if let Some(ref path) = args.rules {
        builder = builder.post_process_rules(load_rules(path).await?);
    }
    builder = apply_model_args(builder, model).await?;
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn apply_model_args(
    builder: ConversionConfigBuilder,
    model: &ModelArgs,
) -> Result<ConversionConfigBuilder> {
    let mut builder = builder.model_id(model.model.clone()).engine_options(EngineOptions {
        model_location: model.model_location.clone(),
        temperature: model.temperature,
        max_tokens: model.max_tokens,
    });

    if let Some(ref path) = model.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        let prompt_builder: PromptBuilder = Arc::new(move |text: &str| template.replace("{text}", text));
        builder = builder.prompt_builder(prompt_builder);
    }

    Ok(builder)
}

async fn load_rules(path: &Path) -> Result<Vec<NormalizationRule>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read rules from {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid rules file {:?}", path))
}

/// Write to `output` (atomically) or stdout.
async fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_output(path, text).await.context("Failed to write output")?;
            eprintln!("{} {}", dim("→"), bold(&path.display().to_string()));
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
