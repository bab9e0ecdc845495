pub mod executor;
pub mod models;
pub mod pipeline;
pub mod validator;

use std::error::Error;
use std::fmt;

use self::models::RejectionReason;

/// Failure of one pipeline stage. Each variant names the stage that failed;
/// the message is what the caller sees in the response's `error` field.
#[derive(Debug)]
pub enum PipelineError {
    MetadataUnavailable(String),
    GenerationFailed(String),
    ValidationRejected(RejectionReason),
    ExecutionFailed(String),
    SummarizationFailed(String),
    UnexpectedFailure(String),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::MetadataUnavailable(_) => "metadata",
            PipelineError::GenerationFailed(_) => "generation",
            PipelineError::ValidationRejected(_) => "validation",
            PipelineError::ExecutionFailed(_) => "execution",
            PipelineError::SummarizationFailed(_) => "summarization",
            PipelineError::UnexpectedFailure(_) => "unexpected",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MetadataUnavailable(msg) => write!(f, "Schema metadata unavailable: {}", msg),
            PipelineError::GenerationFailed(msg) => write!(f, "SQL generation failed: {}", msg),
            PipelineError::ValidationRejected(reason) => {
                write!(f, "Generated SQL was rejected: {}", reason)
            }
            PipelineError::ExecutionFailed(msg) => write!(f, "Query execution failed: {}", msg),
            PipelineError::SummarizationFailed(msg) => write!(f, "Answer summarization failed: {}", msg),
            PipelineError::UnexpectedFailure(msg) => write!(f, "Unexpected failure: {}", msg),
        }
    }
}

impl Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_reason() {
        let err = PipelineError::ValidationRejected(RejectionReason::NonSelectStatement);
        assert_eq!(err.stage(), "validation");
        assert_eq!(err.to_string(), "Generated SQL was rejected: non-select statement");
    }

    #[test]
    fn test_generation_message() {
        let err = PipelineError::GenerationFailed("LLM request timed out: 60s".to_string());
        assert_eq!(err.stage(), "generation");
        assert!(err.to_string().starts_with("SQL generation failed"));
    }
}
