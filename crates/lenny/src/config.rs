//! Configuration for lenny

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "LENNY_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LennyConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Model invocation configuration
    pub llm: LlmConfig,
    /// Answer pipeline configuration
    pub pipeline: PipelineConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking / index build configuration
    pub chunking: ChunkingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl LennyConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, then `LENNY_CONFIG`, then defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_iterations == 0 {
            return Err(Error::Config("pipeline.max_iterations must be at least 1".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::Config("llm.timeout_secs must be at least 1".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.chunking.max_chars == 0 {
            return Err(Error::Config("chunking.max_chars must be at least 1".into()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be at least 1".into()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: false,
        }
    }
}

/// How the model is reached
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvokerBackend {
    /// `<command> run <model>` with the prompt on stdin
    #[default]
    Process,
    /// Ollama HTTP API (`/api/generate`)
    Http,
}

/// Model invocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Invoker backend
    pub backend: InvokerBackend,
    /// Executable for the process backend
    pub command: String,
    /// Model identifier passed to the runtime
    pub model: String,
    /// Ollama base URL for the HTTP backend
    pub base_url: String,
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
    /// Temperature (HTTP backend only)
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// Per-invocation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: InvokerBackend::Process,
            command: "ollama".to_string(),
            model: "lenny".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
            temperature: None,
        }
    }
}

/// Answer pipeline profile
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// One generate step, clean, return
    SinglePass,
    /// Generate, evaluate and refine up to `max_iterations` times
    #[default]
    Refine,
}

/// Answer pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline profile
    pub mode: PipelineMode,
    /// Upper bound on generate/evaluate/refine passes (refine mode)
    pub max_iterations: usize,
    /// Persona preamble opening every prompt
    pub persona: String,
    /// Substrings of the diagnostic stream that abort the run
    pub critical_markers: Vec<String>,
    /// Substrings of a lower-cased evaluation that end the loop
    pub satisfaction_phrases: Vec<String>,
}

impl PipelineConfig {
    /// Whether answers are evaluated and refined
    pub fn evaluates(&self) -> bool {
        self.mode == PipelineMode::Refine
    }

    /// Whether stderr is scanned for critical markers
    pub fn scans_diagnostics(&self) -> bool {
        self.mode == PipelineMode::Refine
    }

    /// Number of loop passes actually run
    pub fn iterations(&self) -> usize {
        match self.mode {
            PipelineMode::SinglePass => 1,
            PipelineMode::Refine => self.max_iterations,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Refine,
            max_iterations: 3,
            persona: "You are Lenny, a helpful assistant.".to_string(),
            critical_markers: ["Traceback", "Error:", "Exception", "Critical"]
                .into_iter()
                .map(String::from)
                .collect(),
            satisfaction_phrases: ["no shortcomings", "no errors", "correct", "satisfactory"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Ground prompts with retrieved chunks
    pub enabled: bool,
    /// Number of chunks spliced into the prompt
    pub top_k: usize,
    /// Flat L2 index file
    pub index_path: PathBuf,
    /// Chunk text store
    pub chunks_path: PathBuf,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let dir = PathBuf::from("embeddings");
        Self {
            enabled: false,
            top_k: 5,
            index_path: dir.join("faiss_index.bin"),
            chunks_path: dir.join("chunks.json"),
        }
    }
}

/// Embedding backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX sentence-transformer
    #[default]
    Onnx,
    /// Ollama `/api/embeddings`
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub backend: EmbeddingBackend,
    /// Model to use (default: all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Cache directory for models
    pub cache_dir: PathBuf,
    /// Ollama base URL for the ollama backend
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lenny")
                .join("models"),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Text chunking and index build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub max_chars: usize,
    /// Source document for the index builder
    pub source_pdf: PathBuf,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            source_pdf: PathBuf::from("data").join("your_document.pdf"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the log file; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Log file name
    pub file_name: String,
    /// Size at which the log file is rotated
    pub max_bytes: u64,
    /// Number of rotated files kept
    pub max_backups: usize,
    /// Level written to the file
    pub file_level: String,
    /// Level written to the console
    pub console_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: Some(PathBuf::from(".")),
            file_name: "lenny.log".to_string(),
            max_bytes: 5 * 1024 * 1024,
            max_backups: 3,
            file_level: "debug".to_string(),
            console_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_behavior() {
        let config = LennyConfig::default();
        assert_eq!(config.pipeline.max_iterations, 3);
        assert_eq!(config.llm.timeout(), Duration::from_secs(60));
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chunking.max_chars, 500);
        assert_eq!(config.logging.max_backups, 3);
        assert!(config.pipeline.critical_markers.contains(&"Error:".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LennyConfig::from_toml(
            r#"
            [llm]
            model = "lenny_cot"

            [pipeline]
            mode = "single_pass"

            [retrieval]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "lenny_cot");
        assert_eq!(config.llm.command, "ollama");
        assert_eq!(config.pipeline.mode, PipelineMode::SinglePass);
        assert_eq!(config.pipeline.iterations(), 1);
        assert!(!config.pipeline.evaluates());
        assert!(config.retrieval.enabled);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validation_rejects_zero_bounds() {
        assert!(LennyConfig::from_toml("[pipeline]\nmax_iterations = 0").is_err());
        assert!(LennyConfig::from_toml("[llm]\ntimeout_secs = 0").is_err());
        assert!(LennyConfig::from_toml("[retrieval]\ntop_k = 0").is_err());
        assert!(LennyConfig::from_toml("not = [valid").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lenny.toml");
        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();

        let config = LennyConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9090);
        assert!(LennyConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
