//! HTTP client for OpenAI-compatible endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use mnema_core::defaults;
use mnema_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector};

use super::error::{to_mnema_error, Capability, OpenAIErrorCode};
use super::types::{
    chat_messages, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse, OpenAIErrorResponse, ResponseFormat,
};

pub const DEFAULT_OPENAI_URL: &str = defaults::OPENAI_URL;
pub const DEFAULT_EMBED_MODEL: &str = defaults::OPENAI_EMBED_MODEL;
pub const DEFAULT_GEN_MODEL: &str = defaults::OPENAI_GEN_MODEL;
/// Output size of text-embedding-3-small.
pub const DEFAULT_DIMENSION: usize = defaults::OPENAI_EMBED_DIMENSION;
pub const DEFAULT_TIMEOUT_SECS: u64 = defaults::GEN_TIMEOUT_SECS;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`OpenAIBackend`].
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub base_url: String,
    /// Sent as a bearer token; local servers usually need none.
    pub api_key: Option<String>,
    pub embed_model: String,
    pub gen_model: String,
    pub embed_dimension: usize,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Send `response_format: json_object` with JSON requests. Some
    /// compatible servers reject the field.
    pub json_mode: bool,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            temperature: 0.7,
            max_tokens: 1000,
            json_mode: true,
        }
    }
}

impl OpenAIConfig {
    /// Read `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `OPENAI_EMBED_MODEL`,
    /// `OPENAI_GEN_MODEL`, `OPENAI_EMBED_DIM`, `MNEMA_GEN_TIMEOUT_SECS` and
    /// `OPENAI_JSON_MODE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        config.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(model) = lookup("OPENAI_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(model) = lookup("OPENAI_GEN_MODEL") {
            config.gen_model = model;
        }
        if let Some(dim) = lookup("OPENAI_EMBED_DIM").and_then(|v| v.trim().parse().ok()) {
            config.embed_dimension = dim;
        }
        if let Some(secs) = lookup("MNEMA_GEN_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.timeout_seconds = secs;
        }
        if let Some(flag) = lookup("OPENAI_JSON_MODE") {
            config.json_mode = !matches!(flag.trim().to_lowercase().as_str(), "0" | "false" | "off");
        }
        config
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        info!(
            base_url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            json_mode = config.json_mode,
            "OpenAI-compatible backend configured"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B, capability: Capability) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .authorized(self.client.post(self.url(endpoint)))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                to_mnema_error(
                    OpenAIErrorCode::Unknown,
                    &format!("Request to {} failed: {}", endpoint, e),
                    capability,
                )
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, capability).await);
        }
        response.json().await.map_err(|e| {
            to_mnema_error(
                OpenAIErrorCode::Unknown,
                &format!("Failed to parse {} response: {}", endpoint, e),
                capability,
            )
        })
    }

    async fn error_from(response: Response, capability: Capability) -> Error {
        let status = response.status().as_u16();
        let (error_type, message) = match response.json::<OpenAIErrorResponse>().await {
            Ok(body) => (body.error.error_type, body.error.message),
            Err(_) => (String::new(), "no error body".to_string()),
        };
        let code = OpenAIErrorCode::from_response(status, &error_type);
        debug!(status, ?code, retryable = code.is_retryable(), "Endpoint returned an error");
        to_mnema_error(code, &format!("OpenAI returned {}: {}", status, message), capability)
    }

    async fn chat(&self, system: &str, prompt: &str, json: bool) -> Result<String> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.config.gen_model,
            messages: chat_messages(system, prompt),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: (json && self.config.json_mode).then(ResponseFormat::json_object),
            stream: false,
        };
        let reply: ChatCompletionResponse = self
            .post("/chat/completions", &request, Capability::Generation)
            .await?;
        let content = reply
            .first_content()
            .ok_or_else(|| Error::Inference("Response contained no choices".to_string()))?;

        debug!(
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "openai", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.config.embed_model,
            input: texts,
            encoding_format: "float",
        };
        let reply: EmbeddingResponse = self
            .post("/embeddings", &request, Capability::Embedding)
            .await?;

        let vectors = reply.into_ordered();
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Endpoint returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        debug!(result_count = vectors.len(), "Embedding complete");
        Ok(vectors.into_iter().map(Vector::from).collect())
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "openai", op = "generate", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate_json_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "openai", op = "generate_json", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn health_check(&self) -> Result<bool> {
        let result = self
            .authorized(self.client.get(self.url("/models")))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        let healthy = match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "OpenAI-compatible health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "OpenAI-compatible endpoint unreachable");
                false
            }
        };
        Ok(healthy)
    }
}
