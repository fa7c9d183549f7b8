//! Builds the retrieval index from a PDF
//!
//! Run with: cargo run -p lenny --bin lenny-index -- data/your_document.pdf

use anyhow::Context;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use lenny::{
    config::CONFIG_ENV,
    embeddings::build_embedder,
    ingestion::{IndexBuilder, SentenceChunker},
    telemetry::init_logging,
    LennyConfig,
};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks embedded";

#[derive(Parser, Debug)]
#[command(name = "lenny-index", version)]
#[command(about = "Extract, chunk and embed a PDF for retrieval")]
struct Args {
    /// Source PDF (default from configuration: data/your_document.pdf)
    pdf: Option<PathBuf>,

    /// Directory for faiss_index.bin and chunks.json
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Maximum chunk length in characters
    #[arg(long)]
    max_chars: Option<usize>,

    /// TOML configuration file
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = LennyConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(pdf) = args.pdf {
        config.chunking.source_pdf = pdf;
    }
    if let Some(max_chars) = args.max_chars {
        config.chunking.max_chars = max_chars;
    }
    if let Some(dir) = args.output {
        config.retrieval.index_path = dir.join("faiss_index.bin");
        config.retrieval.chunks_path = dir.join("chunks.json");
    }
    config.validate()?;

    let _log_guard = init_logging(&config.logging)?;

    println!(
        "{} {}",
        style("Indexing").bold().green(),
        config.chunking.source_pdf.display()
    );

    let embedder = build_embedder(&config.embeddings).await?;
    let builder = IndexBuilder::new(
        embedder,
        SentenceChunker::new(config.chunking.max_chars),
        config.embeddings.batch_size,
    );

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .context("invalid progress bar template")?
            .progress_chars("█▓▒░ "),
    );

    let report = builder
        .build(
            &config.chunking.source_pdf,
            &config.retrieval.index_path,
            &config.retrieval.chunks_path,
            |done, total| {
                progress.set_length(total as u64);
                progress.set_position(done as u64);
            },
        )
        .await;
    progress.finish_and_clear();
    let report = report?;

    println!(
        "{} {} pages, {} characters, {} chunks ({} dims) in {}ms",
        style("Done:").bold().green(),
        report.pages.unwrap_or(0),
        report.characters,
        report.chunks,
        report.dimensions,
        report.elapsed_ms
    );
    println!("  Index:  {}", report.index_path.display());
    println!("  Chunks: {}", report.chunks_path.display());

    Ok(())
}
