//! Application state for the chat server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{InvokerBackend, LennyConfig};
use crate::embeddings::build_embedder;
use crate::error::Result;
use crate::generation::{AnswerPipeline, ModelInvoker, OllamaInvoker, ProcessInvoker};
use crate::retrieval::Retriever;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: LennyConfig,
    /// Answer pipeline shared by all requests
    pipeline: AnswerPipeline,
    /// Ready state
    ready: AtomicBool,
}

impl AppState {
    /// Wrap an already built pipeline
    pub fn new(config: LennyConfig, pipeline: AnswerPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                ready: AtomicBool::new(true),
            }),
        }
    }

    /// Build the invoker, the optional retriever and the pipeline from configuration
    pub async fn from_config(config: LennyConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let invoker = build_invoker(&config)?;
        tracing::info!(
            "Model invoker: {} (model {}, timeout {}s)",
            invoker.name(),
            config.llm.model,
            config.llm.timeout_secs
        );

        let mut pipeline = AnswerPipeline::new(invoker, &config.pipeline, config.llm.timeout());
        tracing::info!(
            "Answer pipeline: {:?} mode, up to {} iteration(s)",
            config.pipeline.mode,
            config.pipeline.iterations()
        );

        if config.retrieval.enabled {
            let embedder = build_embedder(&config.embeddings).await?;
            let retriever = Retriever::load(&config.retrieval, embedder)?;
            tracing::info!(
                "Retrieval enabled: {} chunks, top {}",
                retriever.len(),
                config.retrieval.top_k
            );
            pipeline = pipeline.with_retriever(Arc::new(retriever));
        }

        Ok(Self::new(config, pipeline))
    }

    /// Get configuration
    pub fn config(&self) -> &LennyConfig {
        &self.inner.config
    }

    /// Get the answer pipeline
    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.inner.pipeline
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::Release);
    }
}

/// Build the configured model invoker
pub fn build_invoker(config: &LennyConfig) -> Result<Arc<dyn ModelInvoker>> {
    Ok(match config.llm.backend {
        InvokerBackend::Process => Arc::new(ProcessInvoker::new(&config.llm)),
        InvokerBackend::Http => Arc::new(OllamaInvoker::new(&config.llm)?),
    })
}
