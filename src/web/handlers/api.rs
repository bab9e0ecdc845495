use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::schema::SchemaMetadata;
use crate::query::models::QueryOutcome;
use crate::web::state::AppState;

// Request/Response structures
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    pub response: String,
    pub sql_query: Option<String>,
    pub error: Option<String>,
}

impl From<QueryOutcome> for AskResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            response: outcome.answer_text,
            sql_query: outcome.sql_text,
            error: outcome.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub loaded_at: Option<DateTime<Utc>>,
    pub table_count: usize,
    pub schema: SchemaMetadata,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub database: String,
    pub llm_backend: String,
    pub llm_model: String,
    pub schema_loaded_at: Option<DateTime<Utc>>,
    pub table_count: Option<usize>,
}

/// Answers a natural-language question. Pipeline failures still return 200;
/// the `error` field says which stage failed.
pub async fn ask(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> (StatusCode, Json<AskResponse>) {
    if payload.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AskResponse {
                response: String::new(),
                sql_query: None,
                error: Some("Question must not be empty".to_string()),
            }),
        );
    }

    let outcome = app_state.pipeline.answer(&payload.question).await;
    (StatusCode::OK, Json(outcome.into()))
}

pub async fn get_schema(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SchemaResponse>, (StatusCode, String)> {
    let schema = app_state.schema_manager.get_schema().await.map_err(|e| {
        error!("Failed to load schema metadata: {}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Schema metadata unavailable: {}", e),
        )
    })?;

    Ok(Json(SchemaResponse {
        loaded_at: app_state.schema_manager.loaded_at(),
        table_count: schema.table_count(),
        schema: schema.as_ref().clone(),
    }))
}

/// Re-introspects the database and replaces both cached copies.
pub async fn refresh_schema(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SchemaResponse>, (StatusCode, String)> {
    info!("Schema refresh requested");
    let schema = app_state.schema_manager.refresh().await.map_err(|e| {
        error!("Failed to refresh schema metadata: {}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Schema metadata unavailable: {}", e),
        )
    })?;

    Ok(Json(SchemaResponse {
        loaded_at: app_state.schema_manager.loaded_at(),
        table_count: schema.table_count(),
        schema: schema.as_ref().clone(),
    }))
}

pub async fn system_status(State(app_state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let cached = app_state.schema_manager.current();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: app_state.uptime_seconds(),
        database: app_state.config.database.connection_string.clone(),
        llm_backend: app_state.backend.clone(),
        llm_model: app_state.config.llm.model.clone(),
        schema_loaded_at: app_state.schema_manager.loaded_at(),
        table_count: cached.map(|schema| schema.table_count()),
    })
}
