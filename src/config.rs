use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    /// Open the database in read-only mode (ignored for `:memory:`)
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Decoding parameters for one kind of completion call
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct DecodingSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Dialect name the generation prompt asks the model to write
    #[serde(default = "default_sql_dialect")]
    pub sql_dialect: String,
    #[serde(default = "default_generation_decoding")]
    pub generation: DecodingSettings,
    #[serde(default = "default_summary_decoding")]
    pub summary: DecodingSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CacheConfig {
    /// Where the schema snapshot is persisted. Defaults to `<data_dir>/schema_cache.json`.
    pub schema_cache_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExampleConfig {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// Worked examples appended after the built-in one
    #[serde(default)]
    pub examples: Vec<ExampleConfig>,
    #[serde(default = "default_max_summary_rows")]
    pub max_summary_rows: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for data storage
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Re-introspect the database at startup and rewrite the schema cache
    #[arg(long)]
    pub refresh_schema: bool,

    /// Answer a single question, print the response as JSON and exit
    #[arg(long, value_name = "QUESTION")]
    pub ask: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/askdb/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Credentials usually arrive through the environment, e.g. ASKDB__LLM__API_KEY
        config_builder = config_builder.add_source(
            Environment::with_prefix("ASKDB")
                .prefix_separator("__")
                .separator("__"),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that every value the pipeline needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.connection_string.trim().is_empty() {
            return Err(ConfigError::Message(
                "database.connection_string must not be empty".to_string(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Message("database.pool_size must be at least 1".to_string()));
        }
        if self.database.query_timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(ConfigError::Message("timeouts must be greater than zero".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Message("llm.model must not be empty".to_string()));
        }

        match self.llm.backend.as_str() {
            "remote" => {
                if is_blank(&self.llm.api_url) {
                    return Err(ConfigError::Message(
                        "llm.api_url is required for the remote backend".to_string(),
                    ));
                }
                if is_blank(&self.llm.api_key) {
                    return Err(ConfigError::Message(
                        "llm.api_key is required for the remote backend".to_string(),
                    ));
                }
            }
            "ollama" => {}
            other => {
                return Err(ConfigError::Message(format!("Unsupported LLM backend: {}", other)));
            }
        }

        Ok(())
    }

    /// Location of the durable schema cache
    pub fn schema_cache_path(&self) -> PathBuf {
        match &self.cache.schema_cache_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("schema_cache.json"),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_sql_dialect() -> String {
    "DuckDB".to_string()
}

fn default_generation_decoding() -> DecodingSettings {
    DecodingSettings {
        temperature: 0.0,
        max_tokens: 512,
    }
}

fn default_summary_decoding() -> DecodingSettings {
    DecodingSettings {
        temperature: 0.7,
        max_tokens: 512,
    }
}

fn default_max_summary_rows() -> usize {
    50
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            examples: Vec::new(),
            max_summary_rows: default_max_summary_rows(),
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "askdb.duckdb".to_string(),
                pool_size: 5,
                read_only: false,
                query_timeout_secs: default_query_timeout_secs(),
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "ollama".to_string(),
                model: "sqlcoder".to_string(),
                api_key: None,
                api_url: None,
                timeout_secs: default_llm_timeout_secs(),
                sql_dialect: default_sql_dialect(),
                generation: default_generation_decoding(),
                summary: default_summary_decoding(),
            },
            cache: CacheConfig::default(),
            prompt: PromptConfig::default(),
            data_dir: "data".to_string(),
        }
    }
}
