//! Answer pipeline: bounded generate → evaluate → refine against a model invoker
//!
//! The pipeline never fails. Every error, including a panic inside an invoker or
//! retriever, resolves into one of the fixed [`Fallback`] sentences.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::retrieval::ContextRetriever;

use super::cleaner::{clean_output, strip_control_sequences};
use super::invoker::ModelInvoker;
use super::prompt::PromptBuilder;

/// Fixed answers returned in place of model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Invocation failed, timed out, or reported a critical error
    ProcessingFailed,
    /// The model produced no text
    NoResponse,
    /// The loop ended without ever producing a candidate
    NoSatisfactoryAnswer,
}

impl Fallback {
    /// User-facing sentence
    pub fn message(&self) -> &'static str {
        match self {
            Fallback::ProcessingFailed => {
                "I'm sorry, something went wrong while processing your request."
            }
            Fallback::NoResponse => "I'm sorry, I couldn't formulate a response.",
            Fallback::NoSatisfactoryAnswer => {
                "I'm sorry, I couldn't formulate a satisfactory answer."
            }
        }
    }
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Generate,
    Evaluate,
    Refine,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Generate => "generation",
            Stage::Evaluate => "evaluation",
            Stage::Refine => "refinement",
        })
    }
}

/// Model output that passed the abort policy
struct Reply {
    /// Control sequences stripped, line structure kept
    text: String,
    /// Whitespace collapsed as well
    cleaned: String,
}

/// Per-run loop state
#[derive(Debug, Default)]
struct RefinementState {
    /// Completed refine passes, always below the configured bound
    iteration: usize,
    /// Best answer so far
    answer: Option<String>,
}

/// Produces one answer per chat message
pub struct AnswerPipeline {
    invoker: Arc<dyn ModelInvoker>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    prompts: PromptBuilder,
    config: PipelineConfig,
    satisfaction_phrases: Vec<String>,
    timeout: Duration,
}

impl AnswerPipeline {
    /// Create a pipeline over an invoker
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: &PipelineConfig, timeout: Duration) -> Self {
        Self {
            invoker,
            retriever: None,
            prompts: PromptBuilder::new(config.persona.clone()),
            satisfaction_phrases: config
                .satisfaction_phrases
                .iter()
                .map(|phrase| phrase.to_lowercase())
                .collect(),
            config: config.clone(),
            timeout,
        }
    }

    /// Ground every prompt with retrieved context
    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Whether prompts are grounded with retrieved context
    pub fn is_retrieval_augmented(&self) -> bool {
        self.retriever.is_some()
    }

    /// Answer one (already validated) message
    pub async fn answer(&self, message: &str) -> String {
        let start = Instant::now();

        let answer = match AssertUnwindSafe(self.run(message)).catch_unwind().await {
            Ok(Ok(answer)) => answer,
            Ok(Err(fallback)) => fallback.message().to_string(),
            Err(_) => {
                tracing::error!("Answer pipeline panicked, returning fallback");
                Fallback::ProcessingFailed.message().to_string()
            }
        };

        tracing::info!("Answer ready in {}ms", start.elapsed().as_millis());
        answer
    }

    async fn run(&self, message: &str) -> Result<String, Fallback> {
        let context = match &self.retriever {
            Some(retriever) => {
                let context = retriever.retrieve(message).await.map_err(|e| {
                    tracing::error!("Context retrieval failed: {}", e);
                    Fallback::ProcessingFailed
                })?;
                tracing::debug!("Retrieved context:\n{}", context);
                Some(context)
            }
            None => None,
        };

        let prompt = self.prompts.answer(message, context.as_deref());
        let iterations = self.config.iterations();
        let mut state = RefinementState::default();

        tracing::info!(
            "Starting answer loop with {} ({} pass(es) max)",
            self.invoker.name(),
            iterations
        );
        tracing::debug!("Initial prompt:\n{}", prompt);

        while state.iteration < iterations {
            let pass = state.iteration + 1;

            tracing::info!("Iteration {}: generating answer", pass);
            let candidate = self.invoke_checked(Stage::Generate, &prompt).await?.cleaned;
            tracing::debug!("Candidate answer: {}", candidate);

            if !self.config.evaluates() {
                state.answer = Some(candidate);
                break;
            }

            tracing::info!("Iteration {}: evaluating answer", pass);
            let reply = self
                .invoke_checked(Stage::Evaluate, &self.prompts.evaluation(&candidate))
                .await?;
            let evaluation = reply.text.trim().to_lowercase();
            tracing::debug!("Evaluation result: {}", evaluation);

            if self.is_satisfied(&reply.cleaned.to_lowercase()) {
                tracing::info!("Answer is satisfactory, ending iterations");
                state.answer = Some(candidate);
                break;
            }

            tracing::info!("Iteration {}: refining answer", pass);
            let refined = self
                .invoke_checked(Stage::Refine, &self.prompts.refinement(&evaluation, &candidate))
                .await?
                .cleaned;
            tracing::debug!("Refined answer: {}", refined);

            state.answer = Some(refined);
            state.iteration += 1;
        }

        match state.answer {
            Some(answer) => {
                tracing::info!("Final answer: {}", answer);
                Ok(answer)
            }
            None => Err(Fallback::NoSatisfactoryAnswer),
        }
    }

    /// Invoke once and apply the abort policy
    async fn invoke_checked(&self, stage: Stage, prompt: &str) -> Result<Reply, Fallback> {
        tracing::debug!("{} prompt:\n{}", stage, prompt);

        let invocation = self
            .invoker
            .invoke(prompt, self.timeout)
            .await
            .map_err(|e| {
                tracing::error!("Model {} failed: {}", stage, e);
                Fallback::ProcessingFailed
            })?;

        tracing::debug!("{} exit code: {:?}", stage, invocation.exit_code);
        tracing::debug!("Raw stdout: {}", invocation.stdout);
        tracing::debug!("Raw stderr: {}", invocation.stderr);

        if self.config.scans_diagnostics() {
            if let Some(marker) = self.critical_marker(&invocation.stderr) {
                tracing::error!(
                    "Critical error ({}) from model during {}: {}",
                    marker,
                    stage,
                    invocation.stderr
                );
                return Err(Fallback::ProcessingFailed);
            }
        }

        if !invocation.stderr.trim().is_empty() {
            tracing::warn!("Non-critical stderr output during {}:\n{}", stage, invocation.stderr);
        }

        if !invocation.succeeded() {
            tracing::error!("Model {} exited with code {:?}", stage, invocation.exit_code);
            return Err(Fallback::ProcessingFailed);
        }

        let text = strip_control_sequences(&invocation.stdout);
        let cleaned = clean_output(&text);
        if cleaned.is_empty() {
            tracing::error!("Model returned an empty response during {}", stage);
            return Err(Fallback::NoResponse);
        }

        Ok(Reply { text, cleaned })
    }

    fn critical_marker<'a>(&'a self, stderr: &str) -> Option<&'a str> {
        self.config
            .critical_markers
            .iter()
            .find(|marker| stderr.contains(marker.as_str()))
            .map(String::as_str)
    }

    fn is_satisfied(&self, evaluation: &str) -> bool {
        self.satisfaction_phrases
            .iter()
            .any(|phrase| evaluation.contains(phrase.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineMode;
    use crate::error::{Error, Result};
    use crate::generation::Invocation;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned invocations and records every prompt it receives
    struct ScriptedInvoker {
        replies: Mutex<VecDeque<Result<Invocation>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedInvoker {
        fn new(replies: Vec<Result<Invocation>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().len()
        }

        fn prompt(&self, index: usize) -> String {
            self.prompts.lock()[index].clone()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(&self, prompt: &str, _timeout: Duration) -> Result<Invocation> {
            self.prompts.lock().push(prompt.to_string());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Invocation::success("unscripted")))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct PanickingInvoker;

    #[async_trait]
    impl ModelInvoker for PanickingInvoker {
        async fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<Invocation> {
            panic!("runtime exploded");
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct FixedContext(Result<String>);

    #[async_trait]
    impl ContextRetriever for FixedContext {
        async fn retrieve(&self, _question: &str) -> Result<String> {
            match &self.0 {
                Ok(context) => Ok(context.clone()),
                Err(e) => Err(Error::embedding(e.to_string())),
            }
        }
    }

    fn ok(text: &str) -> Result<Invocation> {
        Ok(Invocation::success(text))
    }

    fn with_stderr(stdout: &str, stderr: &str, code: i32) -> Result<Invocation> {
        Ok(Invocation {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        })
    }

    fn refine_pipeline(invoker: Arc<ScriptedInvoker>) -> AnswerPipeline {
        AnswerPipeline::new(invoker, &PipelineConfig::default(), Duration::from_secs(60))
    }

    fn single_pass_pipeline(invoker: Arc<ScriptedInvoker>) -> AnswerPipeline {
        let config = PipelineConfig {
            mode: PipelineMode::SinglePass,
            ..PipelineConfig::default()
        };
        AnswerPipeline::new(invoker, &config, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_satisfied_evaluation_skips_refinement() {
        let invoker = ScriptedInvoker::new(vec![ok("4"), ok("correct, no shortcomings")]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, "4");
        assert_eq!(invoker.calls(), 2);
        assert!(invoker.prompt(0).contains("Question:\nWhat is 2+2?"));
        assert!(invoker.prompt(1).contains("Evaluate the following answer"));
        assert!(invoker.prompt(1).contains("Answer:\n4\n\nEvaluation:"));
    }

    #[tokio::test]
    async fn test_satisfactory_phrase_is_case_insensitive() {
        let invoker = ScriptedInvoker::new(vec![
            ok("Paris"),
            ok("\x1b[1mThe answer is SATISFACTORY.\x1b[0m"),
        ]);
        let answer = refine_pipeline(invoker.clone()).answer("Capital of France?").await;

        assert_eq!(answer, "Paris");
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsatisfied_evaluation_refines_and_continues() {
        let invoker = ScriptedInvoker::new(vec![
            ok("It is big."),
            ok("Too vague. Mention the size."),
            ok("It is   very\nbig."),
            ok("Paris"),
            ok("That is satisfactory"),
        ]);
        let answer = refine_pipeline(invoker.clone()).answer("How big?").await;

        assert_eq!(answer, "Paris");
        assert_eq!(invoker.calls(), 5);
        let refinement = invoker.prompt(2);
        assert!(refinement.contains("Evaluation:\ntoo vague. mention the size."));
        assert!(refinement.contains("Previous Answer:\nIt is big."));
        // The next pass generates from the original question again
        assert_eq!(invoker.prompt(3), invoker.prompt(0));
    }

    #[tokio::test]
    async fn test_refinement_keeps_evaluation_line_structure() {
        let invoker = ScriptedInvoker::new(vec![
            ok("It is big."),
            ok("\x1b[1m  Point 1: vague.\nPoint 2:   short.\x1b[0m\n"),
            ok("It is very big."),
            ok("draft"),
            ok("satisfactory"),
        ]);
        refine_pipeline(invoker.clone()).answer("How big?").await;

        let refinement = invoker.prompt(2);
        assert!(refinement.contains("Evaluation:\npoint 1: vague.\npoint 2:   short.\n\nPrevious Answer:"));
    }

    #[tokio::test]
    async fn test_satisfaction_phrase_may_span_lines() {
        let invoker = ScriptedInvoker::new(vec![ok("4"), ok("There are no\n  shortcomings.")]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, "4");
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_loop_returns_last_refinement() {
        let mut replies = Vec::new();
        for pass in 1..=3 {
            replies.push(ok(&format!("draft {}", pass)));
            replies.push(ok("It lacks detail."));
            replies.push(ok(&format!("refined {}", pass)));
        }
        let invoker = ScriptedInvoker::new(replies);
        let answer = refine_pipeline(invoker.clone()).answer("Explain tides").await;

        assert_eq!(answer, "refined 3");
        assert_eq!(invoker.calls(), 9);
    }

    #[tokio::test]
    async fn test_critical_marker_aborts_despite_success_exit() {
        let invoker = ScriptedInvoker::new(vec![with_stderr("4", "Error: out of memory", 0)]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, Fallback::ProcessingFailed.message());
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_critical_marker_during_evaluation_aborts() {
        let invoker = ScriptedInvoker::new(vec![
            ok("4"),
            with_stderr("fine", "Traceback (most recent call last)", 0),
        ]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, Fallback::ProcessingFailed.message());
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_critical_stderr_is_tolerated() {
        let invoker = ScriptedInvoker::new(vec![
            with_stderr("4", "pulling manifest ⠋", 0),
            ok("correct"),
        ]);
        let answer = refine_pipeline(invoker).answer("What is 2+2?").await;

        assert_eq!(answer, "4");
    }

    #[tokio::test]
    async fn test_nonzero_exit_aborts() {
        let invoker = ScriptedInvoker::new(vec![with_stderr("4", "", 1)]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, Fallback::ProcessingFailed.message());
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_invocation_error_aborts() {
        let invoker = ScriptedInvoker::new(vec![Err(Error::Timeout(Duration::from_secs(60)))]);
        let answer = refine_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, Fallback::ProcessingFailed.message());
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_output_has_its_own_fallback() {
        let invoker = ScriptedInvoker::new(vec![ok("  \n\t ")]);
        let answer = refine_pipeline(invoker).answer("What is 2+2?").await;
        assert_eq!(answer, Fallback::NoResponse.message());

        // Output made only of control sequences cleans down to nothing
        let invoker = ScriptedInvoker::new(vec![ok("4"), ok("\x1b[2K\x1b[1G")]);
        let answer = refine_pipeline(invoker).answer("What is 2+2?").await;
        assert_eq!(answer, Fallback::NoResponse.message());
    }

    #[tokio::test]
    async fn test_single_pass_makes_one_call_and_ignores_diagnostics() {
        let invoker = ScriptedInvoker::new(vec![with_stderr(
            "\x1b[?25lThe answer\n is 4\x1b[?25h",
            "Error: this is only noise",
            0,
        )]);
        let answer = single_pass_pipeline(invoker.clone()).answer("What is 2+2?").await;

        assert_eq!(answer, "The answer is 4");
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_pass_still_checks_exit_code() {
        let invoker = ScriptedInvoker::new(vec![with_stderr("4", "", 2)]);
        let answer = single_pass_pipeline(invoker).answer("What is 2+2?").await;

        assert_eq!(answer, Fallback::ProcessingFailed.message());
    }

    #[tokio::test]
    async fn test_configured_phrases_replace_defaults() {
        let config = PipelineConfig {
            satisfaction_phrases: vec!["LGTM".to_string()],
            critical_markers: vec!["panic".to_string()],
            ..PipelineConfig::default()
        };
        let invoker = ScriptedInvoker::new(vec![
            with_stderr("4", "Error: harmless", 0),
            ok("lgtm"),
        ]);
        let pipeline = AnswerPipeline::new(invoker.clone(), &config, Duration::from_secs(1));

        assert_eq!(pipeline.answer("What is 2+2?").await, "4");
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_panic_is_converted_to_fallback() {
        let pipeline = AnswerPipeline::new(
            Arc::new(PanickingInvoker),
            &PipelineConfig::default(),
            Duration::from_secs(1),
        );

        assert_eq!(
            pipeline.answer("What is 2+2?").await,
            Fallback::ProcessingFailed.message()
        );
    }

    #[tokio::test]
    async fn test_retrieved_context_is_spliced_into_prompt() {
        let invoker = ScriptedInvoker::new(vec![ok("Lenny"), ok("correct")]);
        let pipeline = refine_pipeline(invoker.clone())
            .with_retriever(Arc::new(FixedContext(Ok("first chunk\nsecond chunk".into()))));

        assert!(pipeline.is_retrieval_augmented());
        assert_eq!(pipeline.answer("Who is the author?").await, "Lenny");
        assert!(invoker
            .prompt(0)
            .contains("Context:\nfirst chunk\nsecond chunk\n\nQuestion:\nWho is the author?"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_converted_to_fallback() {
        let invoker = ScriptedInvoker::new(vec![ok("unused")]);
        let pipeline = refine_pipeline(invoker.clone())
            .with_retriever(Arc::new(FixedContext(Err(Error::embedding("model missing")))));

        assert_eq!(
            pipeline.answer("Who is the author?").await,
            Fallback::ProcessingFailed.message()
        );
        assert_eq!(invoker.calls(), 0);
    }
}
