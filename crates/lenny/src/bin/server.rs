//! Lenny chat server
//!
//! Run with: cargo run -p lenny --bin lenny-server -- --config lenny.toml

use anyhow::Context;
use clap::{Parser, ValueEnum};
use console::style;
use std::path::PathBuf;

use lenny::{
    config::{PipelineMode, CONFIG_ENV},
    server::{state::build_invoker, LennyServer},
    telemetry::init_logging,
    LennyConfig,
};

#[derive(Parser, Debug)]
#[command(name = "lenny-server", version)]
#[command(about = "Chat front-end for a locally running LLM")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Answer profile
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Ground answers with the pre-built PDF index
    #[arg(long)]
    rag: bool,

    /// Model passed to the runtime
    #[arg(long)]
    model: Option<String>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    SinglePass,
    Refine,
}

impl From<ModeArg> for PipelineMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SinglePass => PipelineMode::SinglePass,
            ModeArg::Refine => PipelineMode::Refine,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = LennyConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(mode) = args.mode {
        config.pipeline.mode = mode.into();
    }
    if args.rag {
        config.retrieval.enabled = true;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let _log_guard = init_logging(&config.logging)?;

    println!(
        "\n{}\n{}\n",
        style("Lenny").bold().cyan(),
        style("Local LLM chat with evaluate/refine answering").dim()
    );

    tracing::info!("Configuration loaded");
    tracing::info!("  - Mode: {:?}", config.pipeline.mode);
    tracing::info!("  - Model: {} via {:?}", config.llm.model, config.llm.backend);
    tracing::info!("  - Timeout: {}s", config.llm.timeout_secs);
    tracing::info!("  - Retrieval: {}", config.retrieval.enabled);
    tracing::debug!("PATH: {}", std::env::var("PATH").unwrap_or_default());

    // Unreachable runtime is not fatal: every request would fall back
    let invoker = build_invoker(&config)?;
    match invoker.health_check().await {
        Ok(true) => tracing::info!("Model runtime ({}) is available", invoker.name()),
        Ok(false) | Err(_) => {
            tracing::warn!("Model runtime ({}) is not available", invoker.name());
            tracing::warn!("Please start Ollama:");
            tracing::warn!("  1. Start: ollama serve");
            tracing::warn!("  2. Create the model: ollama create {} -f Modelfile", config.llm.model);
        }
    }

    let server = LennyServer::new(config).await?;

    println!("  Chat:   http://{}/", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
