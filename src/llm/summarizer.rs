use crate::db::rows::QueryResult;
use crate::llm::prompt::PromptBuilder;
use crate::llm::{CompletionProvider, DecodingConfig, LlmError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Answer used when a query found nothing and the model gave no usable text
pub const NO_DATA_ANSWER: &str = "No matching data was found for that question.";

/// Turns a query result into a plain-language answer
pub struct ResultSummarizer {
    provider: Arc<dyn CompletionProvider>,
    decoding: DecodingConfig,
    prompts: PromptBuilder,
}

impl ResultSummarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, decoding: DecodingConfig, prompts: PromptBuilder) -> Self {
        Self {
            provider,
            decoding,
            prompts,
        }
    }

    /// Zero-row results always produce an answer: provider failures and blank
    /// output fall back to [`NO_DATA_ANSWER`].
    pub async fn summarize(&self, result: &QueryResult) -> Result<String, LlmError> {
        let prompt = self.prompts.build_summary_prompt(result);
        debug!("Summary prompt: {}", prompt);

        match self.provider.complete(&prompt, &self.decoding).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) if result.is_empty() => {
                warn!("Summary for an empty result came back blank, using fallback answer");
                Ok(NO_DATA_ANSWER.to_string())
            }
            Ok(_) => Err(LlmError::ResponseError("Model returned an empty summary".to_string())),
            Err(e) if result.is_empty() => {
                warn!("Summary for an empty result failed ({}), using fallback answer", e);
                Ok(NO_DATA_ANSWER.to_string())
            }
            Err(e) => Err(e),
        }
    }
}
