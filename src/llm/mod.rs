pub mod generator;
pub mod prompt;
pub mod providers;
pub mod summarizer;

use crate::config::{DecodingSettings, LlmConfig};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use self::generator::SqlGenerator;
use self::prompt::PromptBuilder;
use self::summarizer::ResultSummarizer;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    TimeoutError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::TimeoutError(msg) => write!(f, "LLM request timed out: {}", msg),
        }
    }
}

impl Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::TimeoutError(err.to_string())
        } else {
            LlmError::ConnectionError(err.to_string())
        }
    }
}

/// Decoding parameters sent with a single completion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<DecodingSettings> for DecodingConfig {
    fn from(settings: DecodingSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// A text-completion backend. Every failure mode collapses into [`LlmError`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String, LlmError>;
}

/// Owns the configured provider and hands out the two callers built on it.
pub struct LlmManager {
    provider: Arc<dyn CompletionProvider>,
    generation: DecodingConfig,
    summary: DecodingConfig,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Arc<dyn CompletionProvider> = match config.backend.as_str() {
            "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            generation: config.generation.into(),
            summary: config.summary.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn sql_generator(&self) -> SqlGenerator {
        SqlGenerator::new(Arc::clone(&self.provider), self.generation)
    }

    pub fn summarizer(&self, prompts: PromptBuilder) -> ResultSummarizer {
        ResultSummarizer::new(Arc::clone(&self.provider), self.summary, prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_manager_builds_configured_backend() {
        let config = AppConfig::default().llm;
        let manager = LlmManager::new(&config).unwrap();
        assert_eq!(manager.provider_name(), "ollama");
    }

    #[test]
    fn test_unsupported_backend() {
        let mut config = AppConfig::default().llm;
        config.backend = "local".to_string();
        assert!(matches!(LlmManager::new(&config), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_decoding_follows_config() {
        let mut config = AppConfig::default().llm;
        config.generation = DecodingSettings { temperature: 0.1, max_tokens: 256 };
        let manager = LlmManager::new(&config).unwrap();

        assert_eq!(manager.generation, DecodingConfig { temperature: 0.1, max_tokens: 256 });
        assert_eq!(manager.summary, DecodingConfig { temperature: 0.7, max_tokens: 512 });
    }
}
