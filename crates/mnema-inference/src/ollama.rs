//! Ollama backend over the `/api/embed`, `/api/chat` and `/api/tags`
//! endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use mnema_core::defaults;
use mnema_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector};

pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;
/// Output size of nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

const SLOW_EMBED_MS: u64 = 5_000;
const SLOW_GENERATE_MS: u64 = 30_000;
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and model settings for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embed_model: String,
    pub gen_model: String,
    pub dimension: usize,
    pub embed_timeout: Duration,
    pub gen_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            embed_timeout: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
            gen_timeout: Duration::from_secs(defaults::GEN_TIMEOUT_SECS),
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_BASE`, `OLLAMA_EMBED_MODEL`, `OLLAMA_GEN_MODEL`,
    /// `OLLAMA_EMBED_DIM`, `MNEMA_EMBED_TIMEOUT_SECS` and
    /// `MNEMA_GEN_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("OLLAMA_BASE") {
            config.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(model) = lookup("OLLAMA_GEN_MODEL") {
            config.gen_model = model;
        }
        if let Some(dim) = positive(&lookup, "OLLAMA_EMBED_DIM") {
            config.dimension = dim as usize;
        }
        if let Some(secs) = positive(&lookup, "MNEMA_EMBED_TIMEOUT_SECS") {
            config.embed_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(&lookup, "MNEMA_GEN_TIMEOUT_SECS") {
            config.gen_timeout = Duration::from_secs(secs);
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config
    }
}

fn positive<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid value, using default");
            None
        }
    }
}

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Backend for a local Ollama with default models.
    pub fn new() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    /// Backend with explicit endpoint and models, other settings default.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        Self::from_config(OllamaConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model,
            gen_model,
            dimension,
            ..OllamaConfig::default()
        })
    }

    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    pub fn from_config(config: OllamaConfig) -> Self {
        // Per-request timeouts override this; it only caps stray requests.
        let client = Client::builder()
            .timeout(config.gen_timeout.max(config.embed_timeout))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build tuned HTTP client, using defaults");
                Client::new()
            });
        info!(
            base_url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Ollama backend configured"
        );
        Self { client, config }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// POST a JSON body and decode the JSON reply. Failures are wrapped by
    /// `wrap`, so embedding and generation report their own error kind.
    async fn post<B, R>(
        &self,
        endpoint: &str,
        body: &B,
        timeout: Duration,
        wrap: fn(String) -> Error,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, endpoint))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| wrap(format!("Request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(wrap(format!("Ollama returned {}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| wrap(format!("Failed to parse {} response: {}", endpoint, e)))
    }

    async fn chat(&self, system: &str, prompt: &str, json: bool) -> Result<String> {
        let start = Instant::now();
        let request = ChatRequest::new(&self.config.gen_model, system, prompt, json);
        let reply: ChatReply = self
            .post("/api/chat", &request, self.config.gen_timeout, Error::Inference)
            .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            json_format = json,
            response_len = reply.message.content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > SLOW_GENERATE_MS {
            warn!(duration_ms = elapsed, prompt_len = prompt.len(), slow = true, "Slow generation operation");
        }
        Ok(reply.message.content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedReply {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    /// `"json"` constrains the model to valid JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    /// Thinking models would otherwise prepend their reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, system: &'a str, prompt: &'a str, json: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        Self {
            model,
            messages,
            stream: false,
            format: json.then_some("json"),
            think: json.then_some(false),
        }
    }
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let request = EmbedRequest {
            model: &self.config.embed_model,
            input: texts,
        };
        let reply: EmbedReply = self
            .post("/api/embed", &request, self.config.embed_timeout, Error::Embedding)
            .await?;

        if reply.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                reply.embeddings.len(),
                texts.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(result_count = reply.embeddings.len(), duration_ms = elapsed, "Embedding complete");
        if elapsed > SLOW_EMBED_MS {
            warn!(duration_ms = elapsed, input_count = texts.len(), slow = true, "Slow embedding operation");
        }
        Ok(reply.embeddings.into_iter().map(Vector::from).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate_json_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_json", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let result = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        let healthy = match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Ollama unreachable");
                false
            }
        };
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.embed_model, "nomic-embed-text");
        assert_eq!(config.dimension, 768);
        assert_eq!(config.gen_timeout, Duration::from_secs(defaults::GEN_TIMEOUT_SECS));
    }

    #[test]
    fn test_config_from_lookup_overrides_and_rejects_invalid() {
        let config = OllamaConfig::from_lookup(lookup(&[
            ("OLLAMA_BASE", "http://gpu-box:11434/"),
            ("OLLAMA_GEN_MODEL", "qwen2.5:7b"),
            ("OLLAMA_EMBED_DIM", "1024"),
            ("MNEMA_GEN_TIMEOUT_SECS", "0"),
            ("MNEMA_EMBED_TIMEOUT_SECS", "9"),
        ]));
        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.gen_model, "qwen2.5:7b");
        assert_eq!(config.dimension, 1024);
        assert_eq!(config.gen_timeout, Duration::from_secs(defaults::GEN_TIMEOUT_SECS));
        assert_eq!(config.embed_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_with_config_trims_trailing_slash() {
        let backend = OllamaBackend::with_config(
            "http://gpu-box:11434/".to_string(),
            "mxbai-embed-large".to_string(),
            "qwen2.5:7b".to_string(),
            1024,
        );
        assert_eq!(backend.base_url(), "http://gpu-box:11434");
        assert_eq!(backend.dimension(), 1024);
        assert_eq!(EmbeddingBackend::model_name(&backend), "mxbai-embed-large");
        assert_eq!(GenerationBackend::model_name(&backend), "qwen2.5:7b");
    }

    #[test]
    fn test_json_chat_request_sets_format_and_think() {
        let request = ChatRequest::new("m", "be terse", "hi", true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["think"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_plain_chat_request_omits_format_and_empty_system() {
        let request = ChatRequest::new("m", "", "hi", false);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("format").is_none());
        assert!(json.get("think").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }
}
