//! Embedding providers for document chunks.
//!
//! One chunk in, one vector out. The Ollama-backed client issues HTTP requests
//! directly to the runtime; the offline client produces deterministic vectors so
//! the pipeline can run end to end without a provider. Transport failures are
//! distinguished from per-input failures because the pipeline treats them
//! differently: an unreachable provider fails the document, a rejected input
//! only degrades the affected chunk.

use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const OLLAMA_FALLBACK_URL: &str = "http://127.0.0.1:11434";

/// Failures surfaced by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// The backend could not be reached at all.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The backend refused or failed to embed the supplied input.
    #[error("Failed to generate embedding: {0}")]
    GenerationFailed(String),
    /// The backend answered with something the client cannot use.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Contract every embedding backend fulfills.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed one chunk of text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// Build the embedding client the current configuration asks for.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| OLLAMA_FALLBACK_URL.to_string());
            Box::new(OllamaEmbeddingClient::new(
                base_url,
                config.embedding_model.clone(),
                config.embedding_dimension,
            ))
        }
        EmbeddingProvider::Offline => {
            Box::new(OfflineEmbeddingClient::new(config.embedding_dimension))
        }
    }
}

/// Embedding client backed by a local Ollama runtime.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbeddingClient {
    /// Construct a client for the given runtime URL, model, and expected dimension.
    pub fn new(base_url: String, model: String, dimension: usize) -> Self {
        let http = Client::builder()
            .user_agent("docdex/embed")
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");
        Self {
            http,
            base_url,
            model,
            dimension,
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .http
            .post(self.embeddings_url())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "no response from Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama does not serve {}",
                self.embeddings_url()
            )));
        }

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama answered {status}: {detail}"
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!("undecodable Ollama payload: {error}"))
        })?;

        if body.embedding.len() != self.dimension {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected a {}-dimensional embedding, got {}",
                self.dimension,
                body.embedding.len()
            )));
        }

        Ok(body.embedding)
    }
}

/// Deterministic embedding client for provider-less runs.
///
/// Folds the input bytes into a fixed-size vector and normalizes it. Not a
/// semantic embedding; it keeps vector slots populated so full-text retrieval
/// and the rest of the pipeline stay exercisable offline.
pub struct OfflineEmbeddingClient {
    dimension: usize,
}

impl OfflineEmbeddingClient {
    /// Construct a client producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut vector = vec![0.0_f32; dimension];

        for (offset, byte) in text.bytes().enumerate() {
            vector[offset % dimension] += f32::from(byte) / 255.0;
        }

        let norm = vector.iter().map(|slot| slot * slot).sum::<f32>().sqrt();
        if norm > 0.0 {
            for slot in &mut vector {
                *slot /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingClient for OfflineEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "cannot encode into zero-length vectors".to_string(),
            ));
        }
        Ok(Self::encode(text, self.dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String, dimension: usize) -> OllamaEmbeddingClient {
        OllamaEmbeddingClient {
            http: Client::builder()
                .user_agent("docdex-test")
                .build()
                .expect("client"),
            base_url,
            model: "nomic-embed-text".into(),
            dimension,
        }
    }

    #[tokio::test]
    async fn ollama_client_returns_embedding() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(200)
                    .json_body(json!({ "embedding": [0.1, 0.2, 0.3] }));
            })
            .await;

        let client = test_client(server.base_url(), 3);
        let vector = client.embed("hello world").await.expect("embedding");

        mock.assert();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn ollama_client_flags_dimension_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(200).json_body(json!({ "embedding": [0.1] }));
            })
            .await;

        let client = test_client(server.base_url(), 4);
        let error = client.embed("hello").await.expect_err("mismatch");
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_maps_error_status_to_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(500).body("boom");
            })
            .await;

        let client = test_client(server.base_url(), 3);
        let error = client.embed("hello").await.expect_err("error status");
        assert!(
            matches!(error, EmbeddingClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn ollama_client_maps_missing_endpoint_to_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(404);
            })
            .await;

        let client = test_client(server.base_url(), 3);
        let error = client.embed("hello").await.expect_err("missing endpoint");
        assert!(matches!(
            error,
            EmbeddingClientError::ProviderUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn offline_client_is_deterministic_and_normalized() {
        let client = OfflineEmbeddingClient::new(8);
        let first = client.embed("stable input").await.expect("vector");
        let second = client.embed("stable input").await.expect("vector");
        assert_eq!(first, second);
        assert_eq!(first.len(), 8);

        let norm: f32 = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn offline_client_encodes_empty_text_as_zero_vector() {
        let client = OfflineEmbeddingClient::new(4);
        let vector = client.embed("").await.expect("vector");
        assert_eq!(vector, vec![0.0; 4]);
    }
}
