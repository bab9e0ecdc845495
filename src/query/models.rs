use crate::db::schema::SchemaMetadata;
use crate::query::PipelineError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

// Input data for SQL generation
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    pub schema: Arc<SchemaMetadata>,
}

/// Why the validator refused a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Empty,
    NonSelectStatement,
    MultipleStatements,
    DisallowedKeyword(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Empty => write!(f, "empty"),
            RejectionReason::NonSelectStatement => write!(f, "non-select statement"),
            RejectionReason::MultipleStatements => write!(f, "multiple statements"),
            RejectionReason::DisallowedKeyword(keyword) => write!(f, "disallowed keyword {}", keyword),
        }
    }
}

/// Model output together with the validator's verdict. Only the validator
/// creates candidates, and they cannot change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCandidate {
    text: String,
    verdict: Result<(), RejectionReason>,
}

/// SQL text that passed validation; the only input the executor accepts.
#[derive(Debug, Clone, Copy)]
pub struct ApprovedSql<'a> {
    sql: &'a str,
}

impl ApprovedSql<'_> {
    pub fn as_str(&self) -> &str {
        self.sql
    }
}

impl SqlCandidate {
    pub(crate) fn accepted(text: &str) -> Self {
        Self {
            text: text.to_string(),
            verdict: Ok(()),
        }
    }

    pub(crate) fn rejected(text: &str, reason: RejectionReason) -> Self {
        Self {
            text: text.to_string(),
            verdict: Err(reason),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }

    pub fn rejection_reason(&self) -> Option<&RejectionReason> {
        self.verdict.as_ref().err()
    }

    pub fn approved(&self) -> Result<ApprovedSql<'_>, RejectionReason> {
        match &self.verdict {
            Ok(()) => Ok(ApprovedSql { sql: self.text.trim() }),
            Err(reason) => Err(reason.clone()),
        }
    }
}

/// What the pipeline hands back for one question. On completion exactly one
/// of `answer_text` and `error_message` is meaningful; `sql_text` is set
/// whenever generation succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub answer_text: String,
    pub sql_text: Option<String>,
    pub error_message: Option<String>,
}

impl QueryOutcome {
    pub fn answered(answer_text: String, sql_text: Option<String>) -> Self {
        Self {
            answer_text,
            sql_text,
            error_message: None,
        }
    }

    pub fn failed(error: &PipelineError, sql_text: Option<String>) -> Self {
        Self {
            answer_text: String::new(),
            sql_text,
            error_message: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_message.is_none()
    }
}
