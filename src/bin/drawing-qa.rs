//! Interactive terminal shell for drawing-qa.
//!
//! A thin shim over the library crate: flags map to `AssistantConfig`, the
//! shell owns the provider session, and every error is printed without
//! ending the session.

use anyhow::{Context, Result};
use clap::Parser;
use drawing_qa::{
    Answer, AssetMode, Assistant, AssistantConfig, DocumentInfo, ProviderKind, ProviderSession,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive session on a local drawing
  drawing-qa assembly.pdf

  # One question, then exit
  drawing-qa assembly.pdf --ask "List all weldments with their detail numbers"

  # Use OpenAI (question only, pages are not sent)
  drawing-qa --provider openai assembly.pdf

  # Save page previews and show what would be sent, without calling a model
  drawing-qa assembly.pdf --preview-dir previews/ --dry-run --ask "What is the scale?"

  # Drawing from a URL, JSON answer
  drawing-qa https://example.com/part.pdf --ask "Drawn date?" --json

INTERACTIVE COMMANDS:
  :open <path|url>                 Upload a new drawing
  :config <provider> [model] [key] Select gemini or openai; key falls back to env
  :info                            Show the current document and provider
  :preview <dir>                   Write page_N.png previews into <dir>
  :dry-run <question>              Show the prompt without sending it
  :help                            Show this list
  :quit                            Leave
  anything else                    Ask it as a question

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  DRAWING_QA_PROVIDER     Default provider (gemini, openai)
  DRAWING_QA_MODEL        Model name override
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides --verbose/--quiet
"#;

/// Ask questions about engineering-drawing PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "drawing-qa",
    version,
    about = "Ask questions about engineering-drawing PDFs using multimodal LLMs",
    long_about = "Upload an engineering-drawing PDF, preview its pages, and ask natural-language \
questions. Each page is rendered to an image and sent, with its extracted text, to Google Gemini. \
OpenAI is available as a text-only provider that sees the question alone.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: Option<String>,

    /// LLM provider: gemini (pages + text) or openai (question only).
    #[arg(long, env = "DRAWING_QA_PROVIDER", value_enum, default_value = "gemini")]
    provider: ProviderArg,

    /// Model name. Default: gemini-2.5-pro or gpt-4o.
    #[arg(long, env = "DRAWING_QA_MODEL")]
    model: Option<String>,

    /// API key. Falls back to GEMINI_API_KEY / OPENAI_API_KEY.
    #[arg(long, env = "DRAWING_QA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Page zoom factor (0.5–8.0). 2.0 renders at 144 DPI.
    #[arg(long, env = "DRAWING_QA_ZOOM", default_value_t = drawing_qa::config::DEFAULT_ZOOM)]
    zoom: f32,

    /// Per-page ceiling on extracted text, in characters.
    #[arg(long, env = "DRAWING_QA_MAX_PAGE_CHARS",
          default_value_t = drawing_qa::config::DEFAULT_MAX_PAGE_CHARS)]
    max_page_chars: usize,

    /// Path to a text file replacing the built-in instruction block.
    #[arg(long, env = "DRAWING_QA_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Embed page images in the request instead of uploading them.
    #[arg(long, env = "DRAWING_QA_INLINE_IMAGES")]
    inline_images: bool,

    /// LLM temperature (0.0–2.0). Provider default if unset.
    #[arg(long, env = "DRAWING_QA_TEMPERATURE")]
    temperature: Option<f32>,

    /// Write page previews (page_N.png) into this directory after upload.
    #[arg(long, env = "DRAWING_QA_PREVIEW_DIR")]
    preview_dir: Option<PathBuf>,

    /// Ask this question and exit instead of starting the interactive loop.
    #[arg(long)]
    ask: Option<String>,

    /// Print answers as JSON.
    #[arg(long, env = "DRAWING_QA_JSON")]
    json: bool,

    /// Build the prompt and print it instead of calling the provider.
    #[arg(long, requires = "ask")]
    dry_run: bool,

    /// Print PDF metadata only.
    #[arg(long, conflicts_with_all = ["ask", "preview_dir"])]
    inspect_only: bool,

    /// Per-call provider timeout in seconds.
    #[arg(long, env = "DRAWING_QA_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DRAWING_QA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DRAWING_QA_VERBOSE")]
    verbose: bool,

    /// Suppress everything except answers and errors.
    #[arg(short, long, env = "DRAWING_QA_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Gemini,
    Openai,
}

impl From<ProviderArg> for ProviderKind {
    fn from(v: ProviderArg) -> Self {
        match v {
            ProviderArg::Gemini => ProviderKind::Gemini,
            ProviderArg::Openai => ProviderKind::OpenAi,
        }
    }
}

/// JSON shape of one answered question.
#[derive(Serialize)]
struct AnswerReport<'a> {
    question: &'a str,
    provider: &'a str,
    model: &'a str,
    document: Option<&'a str>,
    page_count: Option<usize>,
    answer: &'a Answer,
    display_text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    let config = build_config(&cli).await?;
    let mut assistant = Assistant::new(config);

    // ── One-shot modes ───────────────────────────────────────────────────
    if cli.inspect_only || cli.ask.is_some() {
        let input = cli
            .input
            .as_deref()
            .context("A PDF path or URL is required with --ask / --inspect-only")?;
        assistant
            .open(input)
            .await
            .with_context(|| format!("Failed to open {input}"))?;

        if cli.inspect_only {
            let info = assistant
                .document()
                .map(|d| d.info().clone())
                .unwrap_or_default();
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&info).context("Failed to serialize metadata")?
                );
            } else {
                print_info(input, &info);
            }
            return Ok(());
        }

        if let Some(ref dir) = cli.preview_dir {
            save_previews(&assistant, dir, cli.quiet).await?;
        }

        let question = cli.ask.as_deref().unwrap_or_default();
        if cli.dry_run {
            let preview = assistant
                .dry_run(question)
                .await
                .context("Failed to build prompt")?;
            println!("{}", preview.text);
            return Ok(());
        }

        configure_from_cli(&mut assistant, &cli).context("Provider configuration failed")?;
        let answer = ask_with_spinner(&assistant, question, cli.quiet || cli.json)
            .await
            .context("Question failed")?;
        print_answer(&assistant, question, &answer, cli.json)?;
        return Ok(());
    }

    // ── Interactive session ──────────────────────────────────────────────
    if !cli.quiet {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold("drawing-qa"),
            dim("type :help for commands, :quit to leave")
        );
    }

    if let Some(ref input) = cli.input {
        match assistant.open(input).await {
            Ok(doc) => report_upload(doc.name(), doc.page_count(), cli.quiet),
            Err(e) => report_error(&e),
        }
        if let Some(ref dir) = cli.preview_dir {
            if let Err(e) = save_previews(&assistant, dir, cli.quiet).await {
                report_error(&e);
            }
        }
    }

    match configure_from_cli(&mut assistant, &cli) {
        Ok(session) => {
            if !cli.quiet {
                eprintln!(
                    "{} Using {} / {}",
                    green("✔"),
                    session.provider_name(),
                    session.model()
                );
            }
        }
        Err(e) => report_error(&e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !cli.quiet {
            eprint!("{} ", cyan("?"));
            io::stderr().flush().ok();
        }
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_line(&mut assistant, &cli, line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => report_error(&e),
        }
    }

    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

/// Run one line of interactive input.
async fn handle_line(assistant: &mut Assistant, cli: &Cli, line: &str) -> Result<Flow> {
    let Some(command) = line.strip_prefix(':') else {
        let answer = ask_with_spinner(assistant, line, cli.quiet || cli.json).await?;
        print_answer(assistant, line, &answer, cli.json)?;
        return Ok(Flow::Continue);
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "quit" | "q" | "exit" => return Ok(Flow::Quit),
        "help" | "h" => eprintln!("{}", interactive_help()),
        "open" => {
            anyhow::ensure!(!rest.is_empty(), "Usage: :open <path|url>");
            let doc = assistant
                .open(rest)
                .await
                .with_context(|| format!("Failed to open {rest}"))?;
            report_upload(doc.name(), doc.page_count(), cli.quiet);
        }
        "config" => {
            let mut args = rest.split_whitespace();
            let kind: ProviderKind = args
                .next()
                .context("Usage: :config <gemini|openai> [model] [key]")?
                .parse()?;
            let model = args.next().unwrap_or(kind.default_model()).to_string();
            let key = match args.next() {
                Some(k) => k.to_string(),
                None => std::env::var(kind.api_key_env()).unwrap_or_default(),
            };
            let session = assistant.configure(kind, &model, &key)?;
            eprintln!(
                "{} {} API configured ({})",
                green("✔"),
                session.provider_name(),
                session.model()
            );
        }
        "info" => match assistant.document() {
            Some(doc) => {
                print_info(doc.name(), doc.info());
                print_session(assistant.session());
            }
            None => {
                eprintln!("{}", dim("No document uploaded."));
                print_session(assistant.session());
            }
        },
        "preview" => {
            anyhow::ensure!(!rest.is_empty(), "Usage: :preview <dir>");
            save_previews(assistant, Path::new(rest), cli.quiet).await?;
        }
        "dry-run" | "dryrun" => {
            let preview = assistant
                .dry_run(rest)
                .await
                .context("Failed to build prompt")?;
            println!("{}", preview.text);
            if !preview.truncated_pages.is_empty() {
                eprintln!(
                    "{} text truncated on page(s) {:?}",
                    cyan("⚠"),
                    preview.truncated_pages
                );
            }
        }
        other => anyhow::bail!("Unknown command ':{other}'. Type :help for the list."),
    }
    Ok(Flow::Continue)
}

/// Map CLI args to `AssistantConfig`.
async fn build_config(cli: &Cli) -> Result<AssistantConfig> {
    let mut builder = AssistantConfig::builder()
        .zoom(cli.zoom)
        .max_page_chars(cli.max_page_chars)
        .request_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instructions(text);
    }
    if cli.inline_images {
        builder = builder.asset_mode(AssetMode::Inline);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }

    builder.build().context("Invalid configuration")
}

/// Configure the provider from flags, falling back to the key variable.
fn configure_from_cli<'a>(
    assistant: &'a mut Assistant,
    cli: &Cli,
) -> Result<&'a ProviderSession, drawing_qa::DrawingQaError> {
    let kind = ProviderKind::from(cli.provider);
    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| kind.default_model().to_string());
    let key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var(kind.api_key_env()).ok())
        .unwrap_or_default();
    assistant.configure(kind, &model, &key)
}

async fn ask_with_spinner(
    assistant: &Assistant,
    question: &str,
    hidden: bool,
) -> Result<Answer, drawing_qa::DrawingQaError> {
    let spinner = if hidden {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Thinking");
        if let Some(session) = assistant.session() {
            bar.set_message(format!("{} / {}", session.provider_name(), session.model()));
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let result = assistant.ask(question).await;
    spinner.finish_and_clear();
    result
}

fn print_answer(assistant: &Assistant, question: &str, answer: &Answer, json: bool) -> Result<()> {
    if json {
        let report = AnswerReport {
            question,
            provider: assistant.session().map(|s| s.provider_name()).unwrap_or(""),
            model: assistant.session().map(|s| s.model()).unwrap_or(""),
            document: assistant.document().map(|d| d.name()),
            page_count: assistant.document().map(|d| d.page_count()),
            answer,
            display_text: answer.display_text(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise answer")?
        );
        return Ok(());
    }

    match answer {
        Answer::Text { text, .. } => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        Answer::NoTextOutput { .. } => eprintln!("{} {}", cyan("⚠"), answer.display_text()),
    }
    Ok(())
}

async fn save_previews(assistant: &Assistant, dir: &Path, quiet: bool) -> Result<()> {
    let written = assistant
        .preview(dir)
        .await
        .with_context(|| format!("Failed to write previews to {}", dir.display()))?;
    if !quiet {
        for path in &written {
            eprintln!("  {} {}", green("✓"), dim(&path.display().to_string()));
        }
    }
    Ok(())
}

fn report_upload(name: &str, pages: usize, quiet: bool) {
    if !quiet {
        eprintln!(
            "{} PDF uploaded successfully: {} ({} page{})",
            green("✔"),
            bold(name),
            pages,
            if pages == 1 { "" } else { "s" }
        );
    }
}

fn report_error(e: &dyn std::fmt::Display) {
    eprintln!("{} {:#}", red("✘"), e);
}

fn print_info(name: &str, info: &DocumentInfo) {
    println!("File:         {}", name);
    if let Some(ref t) = info.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = info.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = info.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", info.page_count);
    println!("PDF Version:  {}", info.pdf_version);
    if let Some(ref p) = info.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = info.creator {
        println!("Creator:      {}", c);
    }
    if let Some(ref d) = info.creation_date {
        println!("Created:      {}", d);
    }
    if let Some(ref d) = info.modification_date {
        println!("Modified:     {}", d);
    }
}

fn print_session(session: Option<&ProviderSession>) {
    match session {
        Some(s) => println!("Provider:     {} / {} ({:?})", s.provider_name(), s.model(), s.capability()),
        None => println!("Provider:     not configured"),
    }
}

fn interactive_help() -> &'static str {
    let start = AFTER_HELP.find("INTERACTIVE COMMANDS:").unwrap_or(0);
    let end = AFTER_HELP.find("ENVIRONMENT VARIABLES:").unwrap_or(AFTER_HELP.len());
    AFTER_HELP[start..end].trim_end()
}
