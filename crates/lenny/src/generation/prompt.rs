//! Prompt templates for answering, evaluation and refinement

/// Prompt builder bound to a persona preamble
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl PromptBuilder {
    /// Create a builder for the given persona
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Initial question prompt, optionally grounded with retrieved context
    pub fn answer(&self, question: &str, context: Option<&str>) -> String {
        match context {
            Some(context) => format!(
                "{persona}\n\nUse the following context to answer the question.\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:",
                persona = self.persona,
            ),
            None => format!(
                "{persona}\n\nQuestion:\n{question}\n\nAnswer:",
                persona = self.persona,
            ),
        }
    }

    /// Ask the model to find shortcomings in an answer
    pub fn evaluation(&self, answer: &str) -> String {
        format!(
            "{persona}\n\nEvaluate the following answer for completeness and accuracy. Identify any shortcomings or errors.\n\nAnswer:\n{answer}\n\nEvaluation:",
            persona = self.persona,
        )
    }

    /// Ask the model to address an evaluation
    pub fn refinement(&self, evaluation: &str, answer: &str) -> String {
        format!(
            "{persona}\n\nBased on the following evaluation, refine your previous answer to address the identified shortcomings or errors.\n\nEvaluation:\n{evaluation}\n\nPrevious Answer:\n{answer}\n\nRefined Answer:",
            persona = self.persona,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("You are Lenny, a helpful assistant.")
    }
}
