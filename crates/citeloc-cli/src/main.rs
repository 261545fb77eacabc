use anyhow::{Context, Result};
use citeloc_core::{MatchConfig, MatchResult};
use citeloc_local::{extract_segments, normalize, Document, Outcome, QuoteLocator};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "citeloc")]
#[command(about = "Locate and highlight quotes in rendered HTML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Locate quotes in an HTML document, highlighting each in turn (jsonl).
    Locate(LocateCmd),
    /// Print the searchable segments of an HTML document (jsonl).
    Segments(SegmentsCmd),
    /// Print the normalized form of a string.
    Normalize(NormalizeCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct LocateCmd {
    /// Rendered HTML document.
    #[arg(long)]
    html: PathBuf,
    /// Quote to locate (repeatable; each one supersedes the previous highlight).
    #[arg(long)]
    quote: Vec<String>,
    /// File containing quotes (one per line; blank lines and #comments ignored).
    #[arg(long)]
    quotes_file: Vec<PathBuf>,
    /// Write the document, with the final highlight applied, to this path.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Matching thresholds (json); CITELOC_* variables still override individual fields.
    #[arg(long, env = "CITELOC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct SegmentsCmd {
    /// Rendered HTML document.
    #[arg(long)]
    html: PathBuf,
    /// Matching thresholds (json).
    #[arg(long, env = "CITELOC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct NormalizeCmd {
    text: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(Serialize)]
struct LocateRow<'a> {
    schema_version: u64,
    kind: &'static str,
    quote: &'a str,
    found: bool,
    highlighted: bool,
    result: Option<&'a MatchResult>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CITELOC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MatchConfig> {
    let Some(path) = path else {
        return Ok(MatchConfig::from_env());
    };
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg = MatchConfig::from_json_str(&txt)
        .with_context(|| format!("parse config {}", path.display()))?
        .with_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

fn load_document(path: &Path) -> Result<Document> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("read html {}", path.display()))?;
    Ok(Document::parse(&html))
}

fn load_quotes(files: &[PathBuf], inline: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = inline.to_vec();
    for f in files {
        let txt = std::fs::read_to_string(f)
            .with_context(|| format!("read quotes {}", f.display()))?;
        for raw in txt.lines() {
            let s = raw.trim();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            out.push(s.to_string());
        }
    }
    Ok(out)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Locate(args) => {
            let quotes = load_quotes(&args.quotes_file, &args.quote)?;
            if quotes.is_empty() {
                anyhow::bail!("no quotes given (use --quote or --quotes-file)");
            }
            let config = load_config(args.config.as_deref())?;
            let mut doc = load_document(&args.html)?;
            let mut locator = QuoteLocator::new(config);
            for q in &quotes {
                let outcome = locator.locate_and_highlight(&mut doc, q);
                let row = LocateRow {
                    schema_version: 1,
                    kind: "locate",
                    quote: q,
                    found: outcome.is_found(),
                    highlighted: matches!(outcome, Outcome::Highlighted { .. }),
                    result: outcome.result(),
                };
                println!("{}", serde_json::to_string(&row)?);
            }
            if let Some(out) = args.out {
                std::fs::write(&out, doc.to_html())
                    .with_context(|| format!("write {}", out.display()))?;
            }
        }
        Commands::Segments(args) => {
            let config = load_config(args.config.as_deref())?;
            let doc = load_document(&args.html)?;
            for seg in extract_segments(&doc, &config) {
                println!("{}", serde_json::to_string(&seg)?);
            }
        }
        Commands::Normalize(args) => {
            println!("{}", normalize(&args.text));
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "citeloc",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("citeloc {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
