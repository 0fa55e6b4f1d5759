//! Pluggable text encoders for similarity search.
//!
//! Provides an async trait over embedding models with implementations for a
//! local hashed term-frequency encoder (always available), the Ollama API, and
//! the OpenAI embeddings API. Remote failures are returned to the caller as
//! [`EncoderError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EncoderError, LoadError};

/// Trait for text encoders.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode a single text.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError>;

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;
}

/// Configuration for the encoder collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Provider name: "local" (default), "ollama", "openai".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Embedding dimensions (0 = provider default).
    #[serde(default)]
    pub dimensions: usize,
    /// Override for the provider's API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// L2-normalize vectors returned by remote providers.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    /// Concurrent encode requests while building an index at startup.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_provider() -> String {
    "local".into()
}

fn default_normalize() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dimensions: 0,
            base_url: None,
            normalize: default_normalize(),
            concurrency: default_concurrency(),
        }
    }
}

const LOCAL_DEFAULT_DIMENSIONS: usize = 256;

/// Local hashed term-frequency encoder (no external dependencies).
#[derive(Debug, Clone)]
pub struct LocalEncoder {
    dimensions: usize,
}

impl LocalEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous encode; the async trait method delegates here.
    pub fn encode_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return vector;
        }

        // Count term frequency
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *tf.entry(word).or_insert(0) += 1;
        }

        // Hash each unique term into a dimension
        for (term, count) in &tf {
            let idx = djb2(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn djb2(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[async_trait]
impl Encoder for LocalEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        Ok(self.encode_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

/// Pull the first embedding out of a JSON response at `pointer`.
fn parse_embedding(json: &serde_json::Value, pointer: &str) -> Result<Vec<f32>, EncoderError> {
    let values = json
        .pointer(pointer)
        .and_then(|v| v.as_array())
        .ok_or_else(|| EncoderError::ResponseParse {
            message: format!("missing '{}' in response", pointer),
        })?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EncoderError::ResponseParse {
                    message: "non-numeric embedding component".to_string(),
                })
        })
        .collect()
}

fn finish_remote(
    mut vector: Vec<f32>,
    expected: usize,
    normalize: bool,
) -> Result<Vec<f32>, EncoderError> {
    if expected > 0 && vector.len() != expected {
        return Err(EncoderError::Dimensions {
            expected,
            got: vector.len(),
        });
    }
    if normalize {
        l2_normalize(&mut vector);
    }
    Ok(vector)
}

async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, EncoderError> {
    let resp = request
        .json(body)
        .send()
        .await
        .map_err(|e| EncoderError::Request {
            message: e.to_string(),
        })?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(EncoderError::Request {
            message: format!("HTTP {}: {}", status, text),
        });
    }
    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| EncoderError::ResponseParse {
            message: e.to_string(),
        })
}

/// OpenAI API encoder (uses text-embedding-3-small by default).
pub struct OpenAiEncoder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
    normalize: bool,
}

impl OpenAiEncoder {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".into());
        let dims = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".into()),
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

#[async_trait]
impl Encoder for OpenAiEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let json = post_json(self.client.post(&url).bearer_auth(&self.api_key), &body).await?;
        let vector = parse_embedding(&json, "/data/0/embedding")?;
        finish_remote(vector, self.dims, self.normalize)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Ollama encoder (uses the local Ollama API).
pub struct OllamaEncoder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    base_url: String,
    normalize: bool,
}

impl OllamaEncoder {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "nomic-embed-text".into());
        let dims = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };
        Self {
            client: reqwest::Client::new(),
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

#[async_trait]
impl Encoder for OllamaEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let json = post_json(self.client.post(&url), &body).await?;
        let vector = parse_embedding(&json, "/embeddings/0")?;
        finish_remote(vector, self.dims, self.normalize)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

/// Create an encoder from configuration.
///
/// An unknown provider or a missing API key is a [`LoadError`].
pub fn create_encoder(config: &EncoderConfig) -> Result<Box<dyn Encoder>, LoadError> {
    let encoder: Box<dyn Encoder> = match config.provider.as_str() {
        "local" => {
            let dims = if config.dimensions > 0 {
                config.dimensions
            } else {
                LOCAL_DEFAULT_DIMENSIONS
            };
            Box::new(LocalEncoder::new(dims))
        }
        "ollama" => {
            let mut encoder = OllamaEncoder::new(config.model.clone(), config.base_url.clone())
                .with_normalize(config.normalize);
            if config.dimensions > 0 {
                encoder.dims = config.dimensions;
            }
            Box::new(encoder)
        }
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| LoadError::Encoder {
                    message: "OPENAI_API_KEY is not set".to_string(),
                })?;
            let mut encoder =
                OpenAiEncoder::new(api_key, config.model.clone(), config.base_url.clone())
                    .with_normalize(config.normalize);
            if config.dimensions > 0 {
                encoder.dims = config.dimensions;
            }
            Box::new(encoder)
        }
        other => {
            return Err(LoadError::Encoder {
                message: format!(
                    "unknown encoder provider '{}', expected local, ollama, or openai",
                    other
                ),
            });
        }
    };
    tracing::info!(
        provider = encoder.provider_name(),
        dimensions = encoder.dimensions(),
        "Encoder ready"
    );
    Ok(encoder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_encoder_dimensions() {
        let encoder = LocalEncoder::new(128);
        assert_eq!(encoder.dimensions(), 128);
        assert_eq!(encoder.encode_text("hello world").len(), 128);
    }

    #[test]
    fn test_local_encoder_normalized() {
        let encoder = LocalEncoder::new(128);
        let v = encoder.encode_text("graph neural networks for molecules");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "Expected normalized vector, got norm={}",
            norm
        );
    }

    #[test]
    fn test_local_encoder_empty_text() {
        let encoder = LocalEncoder::new(64);
        let v = encoder.encode_text("");
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_local_encoder_deterministic_and_case_insensitive() {
        let encoder = LocalEncoder::new(128);
        assert_eq!(encoder.encode_text("Same Text"), encoder.encode_text("same text"));
        assert_ne!(
            encoder.encode_text("hello world"),
            encoder.encode_text("goodbye universe")
        );
    }

    #[test]
    fn test_local_encoder_zero_dimensions_clamped() {
        let encoder = LocalEncoder::new(0);
        assert_eq!(encoder.dimensions(), 1);
    }

    #[tokio::test]
    async fn test_encoder_trait_object() {
        let encoder: Box<dyn Encoder> = Box::new(LocalEncoder::new(32));
        assert_eq!(encoder.provider_name(), "local");
        let v = encoder.encode("test").await.unwrap();
        assert_eq!(v.len(), 32);
    }

    #[test]
    fn test_encoder_config_defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.provider, "local");
        assert!(config.model.is_none());
        assert_eq!(config.dimensions, 0);
        assert!(config.normalize);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_encoder_config_deserialize_empty() {
        let config: EncoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.provider, "local");
        assert!(config.normalize);
    }

    #[test]
    fn test_create_encoder_local_default_dims() {
        let encoder = create_encoder(&EncoderConfig::default()).unwrap();
        assert_eq!(encoder.provider_name(), "local");
        assert_eq!(encoder.dimensions(), LOCAL_DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_create_encoder_ollama_dimension_override() {
        let config = EncoderConfig {
            provider: "ollama".into(),
            dimensions: 384,
            ..Default::default()
        };
        let encoder = create_encoder(&config).unwrap();
        assert_eq!(encoder.provider_name(), "ollama");
        assert_eq!(encoder.dimensions(), 384);
    }

    #[test]
    fn test_create_encoder_unknown_provider() {
        let config = EncoderConfig {
            provider: "specter".into(),
            ..Default::default()
        };
        let err = create_encoder(&config).err().unwrap();
        assert!(matches!(err, LoadError::Encoder { .. }));
    }

    #[test]
    fn test_openai_encoder_dimensions() {
        let encoder = OpenAiEncoder::new("test-key".into(), None, None);
        assert_eq!(encoder.dimensions(), 1536);
    }

    #[test]
    fn test_parse_embedding() {
        let json = serde_json::json!({"data": [{"embedding": [0.5, 0.25]}]});
        assert_eq!(
            parse_embedding(&json, "/data/0/embedding").unwrap(),
            vec![0.5, 0.25]
        );
        let json = serde_json::json!({"embeddings": []});
        assert!(parse_embedding(&json, "/embeddings/0").is_err());
    }

    #[test]
    fn test_finish_remote_checks_dimensions() {
        let err = finish_remote(vec![1.0, 2.0], 3, true).unwrap_err();
        assert!(matches!(err, EncoderError::Dimensions { expected: 3, got: 2 }));

        let v = finish_remote(vec![3.0, 4.0], 2, true).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }
}
