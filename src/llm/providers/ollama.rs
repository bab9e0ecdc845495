use crate::config::LlmConfig;
use crate::llm::{CompletionProvider, DecodingConfig, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str, decoding: &DecodingConfig) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            prompt,
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: decoding.temperature,
                num_predict: decoding.max_tokens,
            },
        }
    }
}

fn parse_response(response_text: &str) -> Result<String, LlmError> {
    let ollama_response = serde_json::from_str::<OllamaResponse>(response_text).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
        LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
    })?;

    if ollama_response.done == Some(false) {
        debug!("Ollama reported an unfinished generation");
    }

    Ok(ollama_response.response)
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(&self.build_request(prompt, decoding))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response.text().await?;
        debug!("Raw response from Ollama: {}", response_text);

        parse_response(&response_text)
    }
}
