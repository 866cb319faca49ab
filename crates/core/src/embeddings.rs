use crate::config::{EmbeddingConfig, EmbeddingProvider, DEFAULT_OPENAI_DIMENSIONS};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

const RETRY_BASE_DELAY_MS: u64 = 250;

/// Turns text into vectors. Every vector produced by one embedder has
/// `dimensions()` components and comes from the model named by `model_id()`.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::OpenAi => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        EmbeddingProvider::Ngram => Ok(Box::new(CharacterNgramEmbedder::new(config.dimensions))),
    }
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("char-trigram-fnv1a-{dimensions}"),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `POST /embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    dimensions: usize,
    /// Sent as `dimensions` when a non-native vector size was configured.
    requested_dimensions: Option<usize>,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    /// Fails with [`EmbeddingError::MissingCredential`] before any network I/O
    /// when no API key is configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(EmbeddingError::MissingCredential)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: embeddings_url(&config.endpoint)?,
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            requested_dimensions: (config.dimensions != DEFAULT_OPENAI_DIMENSIONS)
                .then_some(config.dimensions),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.requested_dimensions,
        };

        let mut attempt = 0u32;
        loop {
            let failure = match self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await?;
                    if status.is_success() {
                        let vectors = parse_embedding_response(&text, texts.len())?;
                        check_dimensions(&vectors, self.dimensions)?;
                        return Ok(vectors);
                    }

                    let error = EmbeddingError::ServiceResponse {
                        status: status.as_u16(),
                        details: text,
                    };
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(error) => EmbeddingError::Http(error),
            };

            if attempt >= self.max_retries {
                return Err(failure);
            }

            let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.min(6));
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "embedding request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch_len = batch.len(), "requesting embeddings");
            vectors.extend(self.request_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn embeddings_url(base: &str) -> Result<Url, EmbeddingError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join("embeddings")?)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Vectors ordered by the response's `index` field.
fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|error| EmbeddingError::MalformedResponse(error.to_string()))?;

    if parsed.data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: parsed.data.len(),
        });
    }

    parsed.data.sort_by_key(|datum| datum.index);
    Ok(parsed.data.into_iter().map(|datum| datum.embedding).collect())
}

fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<(), EmbeddingError> {
    match vectors.iter().find(|vector| vector.len() != expected) {
        Some(vector) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        None => Ok(()),
    }
}
