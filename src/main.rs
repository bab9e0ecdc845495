use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod query;
mod util;
mod web;

#[cfg(test)]
mod test_support;

use crate::config::{AppConfig, CliArgs};
use crate::db::duckdb_database::DuckDbDatabase;
use crate::db::schema_cache::SchemaCacheFile;
use crate::db::schema_manager::SchemaManager;
use crate::db::Database;
use crate::llm::prompt::PromptBuilder;
use crate::llm::LlmManager;
use crate::query::pipeline::QueryPipeline;
use crate::util::logging::init_tracing;
use crate::web::handlers::api::AskResponse;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Ensure data directory exists
    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    info!(
        "Opening DuckDB database {} (read_only: {})",
        config.database.connection_string, config.database.read_only
    );
    let database: Arc<dyn Database> = Arc::new(DuckDbDatabase::new(&config.database)?);

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;
    let prompts = PromptBuilder::new(&config.llm.sql_dialect, &config.prompt);

    let cache_file = SchemaCacheFile::new(config.schema_cache_path(), database.target().to_string());
    info!("Schema cache file: {}", cache_file.path().display());
    let schema_manager = Arc::new(SchemaManager::new(Arc::clone(&database), cache_file));

    // Warm the schema cache; a failure here is retried on the first question
    let warmed = if args.refresh_schema {
        schema_manager.refresh().await
    } else {
        schema_manager.get_schema().await
    };
    match warmed {
        Ok(schema) => info!("Schema metadata ready: {} tables", schema.table_count()),
        Err(e) => error!("Failed to initialize schema cache: {}", e),
    }

    let pipeline = QueryPipeline::new(Arc::clone(&schema_manager), database, &llm_manager, prompts);

    if let Some(question) = args.ask.as_deref() {
        if question.trim().is_empty() {
            return Err("--ask needs a non-empty question".into());
        }
        let outcome = pipeline.answer(question).await;
        let succeeded = outcome.is_success();
        println!("{}", serde_json::to_string_pretty(&AskResponse::from(outcome))?);
        if !succeeded {
            std::process::exit(1);
        }
        return Ok(());
    }

    let backend = llm_manager.provider_name().to_string();
    let app_state = Arc::new(AppState::new(config.clone(), pipeline, schema_manager, backend));

    // Start the web server
    info!("Starting askdb server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
