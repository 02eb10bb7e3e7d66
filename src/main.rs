//! Development harness: drives one review session over stdin/stdout instead
//! of a real room connection, so the orchestrator's node graph can be
//! exercised locally. Not part of the crate's external interface - a real
//! deployment drives `ReviewOrchestrator` from an HTTP/signaling layer.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use review_orchestrator::checkpoint::InMemoryCheckpointStore;
use review_orchestrator::models::CandidateDescriptor;
use review_orchestrator::pipeline::{DialoguePipeline, PipelineEvent};
use review_orchestrator::providers::openai::OpenAiLlm;
use review_orchestrator::providers::{EmbeddingProvider, LlmProvider};
use review_orchestrator::retrieval::{InMemoryRetrievalIndex, ProviderEmbedder};
use review_orchestrator::{OrchestratorConfig, ProviderError, ReviewOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "review-session-dev")]
#[command(author, version, about = "Local harness for the review session orchestrator", long_about = None)]
struct Cli {
    /// Candidate display name
    #[arg(long, default_value = "Dev Candidate")]
    candidate: String,

    /// Project title
    #[arg(long, default_value = "Untitled Project")]
    project: String,

    /// OpenAI-compatible API key; falls back to OPENAI_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// Optional YAML config file, layered under environment overrides
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

/// A `DialoguePipeline` that prints AI speech to stdout and reads candidate
/// answers from stdin, so the workflow engine can run without a real room.
struct StdioPipeline;

#[async_trait]
impl DialoguePipeline for StdioPipeline {
    async fn next_event(&mut self) -> Option<PipelineEvent> {
        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin().read_line(&mut buf).ok()?;
            Some(buf.trim().to_string())
        })
        .await
        .ok()??;
        Some(PipelineEvent::CandidateUtterance(line))
    }

    async fn speak(&mut self, text: &str) -> Result<(), ProviderError> {
        println!("AI: {text}");
        std::io::stdout().flush().ok();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let api_key = cli
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context("no API key: pass --api-key or set OPENAI_API_KEY")?;

    let mut config = OrchestratorConfig::load(cli.config.as_deref());
    config.mock_ingestion = true;

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiLlm::new(&api_key, None, "text-embedding-3-small"));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiLlm::new(&api_key, None, "text-embedding-3-small"));
    let retrieval = Arc::new(InMemoryRetrievalIndex::new(Arc::new(ProviderEmbedder(embedder))));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new(config.checkpoint.ring_capacity));

    let orchestrator = ReviewOrchestrator::new(config, retrieval, llm, checkpoints)?;
    let pipeline: Arc<Mutex<dyn DialoguePipeline>> = Arc::new(Mutex::new(StdioPipeline));

    info!(candidate = %cli.candidate, project = %cli.project, "starting dev session");
    let outcome = orchestrator
        .start_session(
            "dev-session",
            "dev-room",
            CandidateDescriptor {
                id: "dev-candidate".to_string(),
                display_name: cli.candidate,
            },
            &cli.project,
            None,
            pipeline,
        )
        .await;

    if let Err(err) = &outcome {
        tracing::error!(%err, "session halted with an error");
    }

    if let Some(session) = orchestrator.session_snapshot("dev-session").await {
        info!(phase = ?session.phase, "session drive loop finished");
        if let Some(report) = &session.final_report {
            println!("\n--- Final report ---\n{report:#?}");
        }
    }

    Ok(())
}
