//! HTTP backends for [`GenerativeClient`].
//!
//! `GeminiClient` talks to the Google Generative Language `generateContent`
//! endpoint. `OpenAiCompatClient` covers OpenAI and any `/chat/completions`
//! compatible server such as Ollama.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use propuesta_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::{GenerationError, GenerationRequest, GenerativeClient, ResilientClient};

const GEMINI_TOP_P: f32 = 0.95;

fn http_client(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| GenerationError::Configuration(error.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(response),
        429 => Err(GenerationError::RateLimited),
        401 | 403 => Err(GenerationError::Authentication(
            "invalid API key or insufficient permissions".to_string(),
        )),
        _ => {
            let body = response.text().await.unwrap_or_default();
            warn!(event_name = "generation.api_error", status, "generative backend returned error");
            Err(GenerationError::Api { status, message: truncate(&body, 500) })
        }
    }
}

fn transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout { after_secs: 0 }
    } else {
        GenerationError::Transport(error.to_string())
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client: http_client(timeout)?,
        })
    }

    fn body(request: &GenerationRequest) -> serde_json::Value {
        // The endpoint is used with a single user turn carrying both instructions.
        let combined = format!("{}\n\n{}", request.system_instruction, request.user_instruction);
        let mut generation_config = json!({
            "temperature": request.temperature,
            "topP": GEMINI_TOP_P,
            "maxOutputTokens": request.max_output_tokens,
        });
        if request.structured {
            generation_config["responseMimeType"] = json!("application/json");
        }
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": combined }] }],
            "generationConfig": generation_config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    fn into_text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<String>();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(backend = "gemini", model = %self.model, label = %request.label, "sending generation request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&Self::body(request))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let payload: GeminiResponse = response.json().await.map_err(|error| {
            GenerationError::Api { status: 200, message: format!("undecodable response: {error}") }
        })?;
        payload.into_text().ok_or(GenerationError::EmptyResponse)
    }
}

pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client: http_client(timeout)?,
        })
    }

    fn body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": request.user_instruction },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
            "stream": false,
        });
        if request.structured {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerativeClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(backend = %self.name, model = %self.model, label = %request.label, "sending generation request");

        let mut builder = self.client.post(&url).json(&self.body(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }
        let response = builder.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;

        let payload: ChatResponse = response.json().await.map_err(|error| {
            GenerationError::Api { status: 200, message: format!("undecodable response: {error}") }
        })?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Builds the configured backend wrapped in [`ResilientClient`].
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn GenerativeClient>, GenerationError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let base_url = config.effective_base_url();

    let client: Arc<dyn GenerativeClient> = match config.provider {
        LlmProvider::Gemini => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                GenerationError::Configuration("gemini requires llm.api_key".to_string())
            })?;
            let backend = GeminiClient::new(base_url, config.model.clone(), api_key, timeout)?;
            Arc::new(ResilientClient::new(backend, timeout, config.max_retries))
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let backend = OpenAiCompatClient::new(
                config.provider.as_str(),
                base_url,
                config.model.clone(),
                config.api_key.clone(),
                timeout,
            )?;
            Arc::new(ResilientClient::new(backend, timeout, config.max_retries))
        }
    };
    Ok(client)
}
