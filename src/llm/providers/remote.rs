use crate::config::LlmConfig;
use crate::llm::{CompletionProvider, DecodingConfig, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// OpenAI-compatible chat-completions endpoint
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str, decoding: &DecodingConfig) -> PromptRequest<'a> {
        PromptRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: decoding.temperature,
            max_tokens: decoding.max_tokens,
        }
    }
}

fn first_choice(response: PromptResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
}

#[async_trait]
impl CompletionProvider for RemoteLlmProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn complete(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String, LlmError> {
        debug!("Sending completion request to {} with model {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_request(prompt, decoding))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("LLM API responded with status code: {}", status);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        first_choice(prompt_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn remote_config() -> LlmConfig {
        let mut config = AppConfig::default().llm;
        config.backend = "remote".to_string();
        config.api_url = Some("https://llm.example.com/v1/chat/completions".to_string());
        config.api_key = Some("secret".to_string());
        config
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut config = remote_config();
        config.api_key = None;
        assert!(matches!(RemoteLlmProvider::new(&config), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_request_carries_decoding() {
        let provider = RemoteLlmProvider::new(&remote_config()).unwrap();
        let decoding = DecodingConfig { temperature: 0.0, max_tokens: 128 };
        let body = serde_json::to_value(provider.build_request("hello", &decoding)).unwrap();

        assert_eq!(body["model"], "sqlcoder");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn test_first_choice() {
        let parsed: PromptResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1"}}]}"#).unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "SELECT 1");

        let empty: PromptResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(empty), Err(LlmError::ResponseError(_))));
    }
}
