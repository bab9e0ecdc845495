use crate::config::AppConfig;
use crate::db::schema_manager::SchemaManager;
use crate::query::pipeline::QueryPipeline;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: QueryPipeline,
    pub schema_manager: Arc<SchemaManager>,
    pub backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pipeline: QueryPipeline,
        schema_manager: Arc<SchemaManager>,
        backend: String,
    ) -> Self {
        Self {
            config,
            pipeline,
            schema_manager,
            backend,
            startup_time: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.startup_time)
            .num_seconds()
    }
}
