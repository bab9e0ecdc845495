use crate::db::schema_manager::SchemaManager;
use crate::db::{Database, DatabaseError};
use crate::llm::generator::SqlGenerator;
use crate::llm::prompt::PromptBuilder;
use crate::llm::summarizer::ResultSummarizer;
use crate::llm::LlmManager;
use crate::query::executor::QueryExecutor;
use crate::query::models::{GenerationRequest, QueryOutcome};
use crate::query::validator::validate;
use crate::query::PipelineError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// question -> schema -> prompt -> SQL -> validation -> rows -> answer.
///
/// Each call runs every stage at most once and stops at the first failure.
/// Dropping the returned future abandons the outstanding provider call; a
/// DuckDB statement already running on a blocking worker runs to completion
/// and then returns its connection to the pool. The same holds when the
/// database timeout fires, so a burst of runaway queries can hold every pooled
/// connection until they finish; later calls then wait on the pool and fail
/// with a timeout of their own.
pub struct QueryPipeline {
    schema_manager: Arc<SchemaManager>,
    prompts: PromptBuilder,
    generator: SqlGenerator,
    executor: QueryExecutor,
    summarizer: ResultSummarizer,
}

impl QueryPipeline {
    pub fn new(
        schema_manager: Arc<SchemaManager>,
        database: Arc<dyn Database>,
        llm_manager: &LlmManager,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            schema_manager,
            generator: llm_manager.sql_generator(),
            summarizer: llm_manager.summarizer(prompts.clone()),
            executor: QueryExecutor::new(database),
            prompts,
        }
    }

    /// Answers one question. Never fails: stage errors are logged and come
    /// back in the outcome, along with the SQL if one was generated.
    pub async fn answer(&self, question: &str) -> QueryOutcome {
        let start_time = Instant::now();
        let mut sql_text = None;

        match self.run(question, &mut sql_text).await {
            Ok(answer) => {
                info!("Answered question in {}ms", start_time.elapsed().as_millis());
                QueryOutcome::answered(answer, sql_text)
            }
            Err(e) => {
                error!(
                    stage = e.stage(),
                    sql = sql_text.as_deref().unwrap_or(""),
                    "Pipeline failed: {}",
                    e
                );
                QueryOutcome::failed(&e, sql_text)
            }
        }
    }

    async fn run(&self, question: &str, sql_text: &mut Option<String>) -> Result<String, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::GenerationFailed("the question is empty".to_string()));
        }
        info!("NL-query: {}", question);

        let schema = self
            .schema_manager
            .get_schema()
            .await
            .map_err(|e| PipelineError::MetadataUnavailable(e.to_string()))?;

        let request = GenerationRequest {
            question: question.to_string(),
            schema,
        };
        let prompt = self.prompts.build_generation_prompt(&request.question, &request.schema);

        let sql = self
            .generator
            .generate_sql(&prompt)
            .await
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;
        info!("Generated SQL: {}", sql);
        *sql_text = Some(sql.clone());

        let candidate = validate(&sql);
        let approved = candidate.approved().map_err(PipelineError::ValidationRejected)?;

        let result = self.executor.execute(approved).await.map_err(|e| match e {
            DatabaseError::TaskError(msg) => PipelineError::UnexpectedFailure(msg),
            other => PipelineError::ExecutionFailed(other.to_string()),
        })?;

        self.summarizer
            .summarize(&result)
            .await
            .map_err(|e| PipelineError::SummarizationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::rows::{QueryResult, Scalar};
    use crate::db::schema::fixtures::sample_schema;
    use crate::db::schema::SchemaMetadata;
    use crate::db::schema_cache::SchemaCacheFile;
    use crate::llm::summarizer::NO_DATA_ANSWER;
    use crate::llm::LlmError;
    use crate::test_support::{FakeDatabase, ScriptedProvider};
    use tempfile::TempDir;

    const COUNT_SQL: &str =
        "SELECT COUNT(*) FROM dbo.Users WHERE RegistrationDate >= DATEADD(month,-1,GETDATE())";

    struct Harness {
        _dir: TempDir,
        db: Arc<FakeDatabase>,
        provider: Arc<ScriptedProvider>,
        pipeline: QueryPipeline,
    }

    fn harness(db: FakeDatabase, responses: Vec<Result<String, LlmError>>) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let db = Arc::new(db);
        let provider = Arc::new(ScriptedProvider::new(responses));

        let cache = SchemaCacheFile::new(dir.path().join("schema_cache.json"), db.target().to_string());
        let schema_manager = Arc::new(SchemaManager::new(db.clone(), cache));
        let llm_manager = LlmManager::with_provider(provider.clone(), &config.llm);
        let prompts = PromptBuilder::new(&config.llm.sql_dialect, &config.prompt);

        Harness {
            _dir: dir,
            pipeline: QueryPipeline::new(schema_manager, db.clone(), &llm_manager, prompts),
            db,
            provider,
        }
    }

    fn count_result() -> QueryResult {
        QueryResult {
            columns: vec!["count".to_string()],
            rows: vec![vec![Scalar::Int(42)]],
        }
    }

    #[tokio::test]
    async fn test_answers_question_end_to_end() {
        let h = harness(
            FakeDatabase::new(sample_schema()).with_result(count_result()),
            vec![
                Ok(COUNT_SQL.to_string()),
                Ok("42 users registered in the last month.".to_string()),
            ],
        );

        let outcome = h.pipeline.answer("How many users registered in the last month?").await;

        assert!(outcome.is_success());
        assert!(outcome.answer_text.contains("42"));
        assert_eq!(outcome.sql_text.as_deref(), Some(COUNT_SQL));
        assert_eq!(h.db.executed(), vec![COUNT_SQL]);

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.contains("dbo.Users"));
        assert!(calls[0].0.ends_with("Question: How many users registered in the last month?\nSQL:"));
        assert_eq!(calls[0].1.temperature, 0.0);
        assert!(calls[1].0.contains("| 42 |"));
        assert_eq!(calls[1].1.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_destructive_sql_never_executes() {
        let h = harness(
            FakeDatabase::new(sample_schema()),
            vec![Ok("DELETE FROM dbo.Users".to_string())],
        );

        let outcome = h.pipeline.answer("Remove every user").await;

        assert!(outcome.answer_text.is_empty());
        assert_eq!(outcome.sql_text.as_deref(), Some("DELETE FROM dbo.Users"));
        assert!(outcome.error_message.unwrap().contains("non-select statement"));
        assert!(h.db.executed().is_empty());
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let h = harness(
            FakeDatabase::new(sample_schema()),
            vec![Err(LlmError::TimeoutError("operation timed out".to_string()))],
        );

        let outcome = h.pipeline.answer("How many users are there?").await;

        assert_eq!(outcome.sql_text, None);
        assert_eq!(outcome.answer_text, "");
        assert!(outcome.error_message.unwrap().contains("SQL generation failed"));
        assert!(h.db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_keeps_sql() {
        let h = harness(
            FakeDatabase::new(sample_schema()).with_execute_error("Catalog Error: Table with name Users does not exist"),
            vec![Ok(COUNT_SQL.to_string())],
        );

        let outcome = h.pipeline.answer("How many users registered in the last month?").await;

        assert_eq!(outcome.sql_text.as_deref(), Some(COUNT_SQL));
        let error = outcome.error_message.unwrap();
        assert!(error.starts_with("Query execution failed"));
        assert!(error.contains("does not exist"));
        // Summarizer is not reached
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_summarization_failure_keeps_sql() {
        let h = harness(
            FakeDatabase::new(sample_schema()).with_result(count_result()),
            vec![
                Ok(COUNT_SQL.to_string()),
                Err(LlmError::ResponseError("API responded with status code: 429".to_string())),
            ],
        );

        let outcome = h.pipeline.answer("How many users registered in the last month?").await;

        assert_eq!(outcome.sql_text.as_deref(), Some(COUNT_SQL));
        assert!(outcome.answer_text.is_empty());
        assert!(outcome.error_message.unwrap().starts_with("Answer summarization failed"));
    }

    #[tokio::test]
    async fn test_zero_rows_still_answers() {
        let empty = QueryResult {
            columns: vec!["count".to_string()],
            rows: vec![],
        };
        let h = harness(
            FakeDatabase::new(sample_schema()).with_result(empty),
            vec![Ok(COUNT_SQL.to_string()), Ok(String::new())],
        );

        let outcome = h.pipeline.answer("How many users registered in the last month?").await;

        assert!(outcome.is_success());
        assert_eq!(outcome.answer_text, NO_DATA_ANSWER);
    }

    #[tokio::test]
    async fn test_metadata_failure_stops_before_generation() {
        let db = FakeDatabase::new(sample_schema());
        db.set_fail_introspection(true);
        let h = harness(db, vec![Ok(COUNT_SQL.to_string())]);

        let outcome = h.pipeline.answer("How many users are there?").await;

        assert!(outcome.error_message.unwrap().starts_with("Schema metadata unavailable"));
        assert_eq!(outcome.sql_text, None);
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_database_is_metadata_failure() {
        let h = harness(
            FakeDatabase::new(SchemaMetadata::default()).with_result(count_result()),
            vec![Ok(COUNT_SQL.to_string()), Ok("42 users.".to_string())],
        );

        let outcome = h.pipeline.answer("How many users are there?").await;
        assert!(outcome.error_message.unwrap().contains("no tables"));
        assert!(h.provider.calls().is_empty());

        // Tables created later are picked up by the next question
        h.db.set_schema(sample_schema());
        let outcome = h.pipeline.answer("How many users are there?").await;
        assert!(outcome.is_success());
        assert_eq!(h.db.introspections(), 2);
    }

    #[tokio::test]
    async fn test_blank_question() {
        let h = harness(FakeDatabase::new(sample_schema()), vec![]);
        let outcome = h.pipeline.answer("   ").await;

        assert!(!outcome.is_success());
        assert_eq!(h.db.introspections(), 0);
    }

    #[tokio::test]
    async fn test_schema_introspected_once_across_questions() {
        let h = harness(
            FakeDatabase::new(sample_schema()).with_result(count_result()),
            vec![
                Ok(COUNT_SQL.to_string()),
                Ok("42.".to_string()),
                Ok(COUNT_SQL.to_string()),
                Ok("Still 42.".to_string()),
            ],
        );

        h.pipeline.answer("first").await;
        h.pipeline.answer("second").await;

        assert_eq!(h.db.introspections(), 1);
    }
}
