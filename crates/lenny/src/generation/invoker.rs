//! Model invocation: one prompt in, raw output out

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Upper bound on `<command> --version` during health checks
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw result of a single model invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Generated text
    pub stdout: String,
    /// Diagnostic side channel
    pub stderr: String,
    /// Exit status; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl Invocation {
    /// A successful invocation with empty diagnostics
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Whether the runtime reported success
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Synchronous prompt → text capability
///
/// Implementations:
/// - `ProcessInvoker`: `ollama run <model>` with the prompt on stdin
/// - `OllamaInvoker`: Ollama HTTP API
///
/// One attempt per call. Callers decide how often to invoke.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Run one prompt, failing with `Error::Timeout` if it takes longer than `timeout`
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<Invocation>;

    /// Check if the runtime is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get invoker name for logging
    fn name(&self) -> &str;
}

/// Runs the model as a child process per prompt
pub struct ProcessInvoker {
    command: String,
    args: Vec<String>,
}

impl ProcessInvoker {
    /// `<command> run <model>`
    pub fn new(config: &LlmConfig) -> Self {
        Self::with_args(
            config.command.clone(),
            vec!["run".to_string(), config.model.clone()],
        )
    }

    /// Arbitrary command line
    pub fn with_args(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Run `<command> --version`, treating a hang like a missing binary
    async fn version_check(&self, timeout: Duration) -> bool {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, output).await {
            Ok(Ok(out)) => out.status.success(),
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!("{} --version did not finish within {:?}", self.command, timeout);
                false
            }
        }
    }
}

#[async_trait]
impl ModelInvoker for ProcessInvoker {
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<Invocation> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::invocation(format!("Failed to spawn {}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::invocation("Failed to capture stdin"))?;

        // Feed stdin while draining stdout/stderr so a chatty process cannot block on a full pipe
        let feed = async move {
            let written = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            match written {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("{} did not finish within {:?}", self.command, timeout);
                return Err(Error::Timeout(timeout));
            }
        };

        fed.map_err(|e| Error::invocation(format!("Failed to write prompt: {}", e)))?;
        let output =
            output.map_err(|e| Error::invocation(format!("Failed to wait for process: {}", e)))?;

        Ok(Invocation {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.version_check(VERSION_CHECK_TIMEOUT).await)
    }

    fn name(&self) -> &str {
        "process"
    }
}
