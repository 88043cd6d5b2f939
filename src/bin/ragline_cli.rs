use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ragline::{
    config, logging,
    loaders::SourceKind,
    processing::{AnswerReport, IngestReport, RagEngine, Status},
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "ragline-cli",
    about = "Ingest documents and ask questions against the local Ragline store"
)]
struct Cli {
    /// Print machine-readable reports instead of plain text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a file, or every supported file under a directory.
    Ingest { path: PathBuf },
    /// Fetch and ingest a web page.
    IngestUrl { url: String },
    /// Answer a question from the stored documents.
    Ask {
        question: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Print the number of stored chunks.
    Count,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();
    let engine = RagEngine::from_config(config::get_config())
        .await
        .context("failed to initialize engine")?;

    match cli.command {
        Command::Ingest { path } => ingest_path(&engine, &path, cli.json).await,
        Command::IngestUrl { url } => {
            let report = IngestReport::from_result(engine.ingest_url(&url).await);
            print_ingest(&url, &report, cli.json)?;
            ensure_success(report.status, "ingestion failed")
        }
        Command::Ask { question, k } => {
            let report = AnswerReport::from_result(engine.answer_question(&question, k).await);
            print_answer(&report, cli.json)?;
            ensure_success(report.status, "question failed")
        }
        Command::Count => {
            let count = engine.count().await;
            if cli.json {
                println!("{}", serde_json::json!({ "count": count }));
            } else {
                println!("{count}");
            }
            Ok(())
        }
    }
}

async fn ingest_path(engine: &RagEngine, path: &Path, json: bool) -> Result<()> {
    let files = collect_files(path)?;
    if files.is_empty() {
        bail!("no supported documents found under {}", path.display());
    }

    let mut failures = 0usize;
    for file in &files {
        let report = IngestReport::from_result(engine.ingest_file(file).await);
        print_ingest(&file.display().to_string(), &report, json)?;
        if report.status == Status::Failed {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} files failed to ingest", files.len());
    }
    Ok(())
}

/// A plain file is returned as-is; directories are walked for supported extensions.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("failed to read {}", path.display()))?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if SourceKind::from_file_name(entry.path()).is_ok() {
            files.push(entry.into_path());
        } else {
            tracing::warn!(path = %entry.path().display(), "Skipping unsupported file");
        }
    }
    Ok(files)
}

fn print_ingest(location: &str, report: &IngestReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else if report.status == Status::Success {
        println!("{}", report.message);
    } else {
        eprintln!("{location}: {}", report.message);
    }
    Ok(())
}

fn print_answer(report: &AnswerReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if report.status == Status::Failed {
        if let Some(message) = &report.message {
            eprintln!("{message}");
        }
        return Ok(());
    }

    println!("{}", report.answer);
    for (position, source) in report.sources.iter().enumerate() {
        let origin = source
            .metadata
            .get("source")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown");
        println!("\n[{}] {origin}\n{}", position + 1, source.content);
    }
    Ok(())
}

fn ensure_success(status: Status, context: &str) -> Result<()> {
    match status {
        Status::Success => Ok(()),
        Status::Failed => bail!("{context}"),
    }
}
