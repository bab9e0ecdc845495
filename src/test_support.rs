//! In-process fakes for the database and provider seams.

use crate::db::rows::QueryResult;
use crate::db::schema::SchemaMetadata;
use crate::db::{Database, DatabaseError};
use crate::llm::{CompletionProvider, DecodingConfig, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct FakeDatabase {
    schema: Mutex<SchemaMetadata>,
    result: Result<QueryResult, String>,
    introspect_delay: Duration,
    fail_introspection: AtomicBool,
    introspections: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn new(schema: SchemaMetadata) -> Self {
        Self {
            schema: Mutex::new(schema),
            result: Ok(QueryResult::default()),
            introspect_delay: Duration::ZERO,
            fail_introspection: AtomicBool::new(false),
            introspections: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = Ok(result);
        self
    }

    pub fn with_execute_error(mut self, message: &str) -> Self {
        self.result = Err(message.to_string());
        self
    }

    pub fn with_introspect_delay(mut self, delay: Duration) -> Self {
        self.introspect_delay = delay;
        self
    }

    /// Stands in for DDL run against the live database
    pub fn set_schema(&self, schema: SchemaMetadata) {
        *self.schema.lock().unwrap() = schema;
    }

    pub fn set_fail_introspection(&self, fail: bool) {
        self.fail_introspection.store(fail, Ordering::SeqCst);
    }

    pub fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn target(&self) -> &str {
        "fake.duckdb"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.result
            .clone()
            .map_err(DatabaseError::StatementError)
    }

    async fn introspect(&self) -> Result<SchemaMetadata, DatabaseError> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        if !self.introspect_delay.is_zero() {
            tokio::time::sleep(self.introspect_delay).await;
        }
        if self.fail_introspection.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionError("connection refused".to_string()));
        }
        Ok(self.schema.lock().unwrap().clone())
    }
}

/// Replays queued responses in order and records every call.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, DecodingConfig)>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, DecodingConfig)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push((prompt.to_string(), *decoding));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ResponseError("no scripted response left".to_string())))
    }
}
