//! Generative-language API abstraction
//!
//! Two seams sit in front of the model provider:
//! - `Generator`: text generation over text and uploaded-file parts, plus the
//!   provider's file storage used for images and videos
//! - `Embedder`: embedding vectors for note chunks and queries
//!
//! `GeminiClient` implements both over REST; the mocks back tests and
//! fully local runs.

mod gemini;
mod mock;

pub use gemini::GeminiClient;
pub use mock::{MockEmbedder, MockGenerator};

use crate::config::GenAiConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What an embedding will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    /// Stored note chunks
    RetrievalDocument,
    /// A user's question
    RetrievalQuery,
}

impl EmbedTask {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            EmbedTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            EmbedTask::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// One piece of model input
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// A file previously uploaded to the provider's file store
    File { uri: String, mime_type: String },
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub parts: Vec<Part>,
    /// Ask for an `application/json` response
    pub json: bool,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(prompt.into())],
            json: false,
            timeout: None,
        }
    }

    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            json: true,
            ..Self::text(prompt)
        }
    }

    /// A file part followed by its instructions
    pub fn with_file(file: &RemoteFile, prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![
                Part::File {
                    uri: file.uri.clone(),
                    mime_type: file.mime_type.clone(),
                },
                Part::Text(prompt.into()),
            ],
            json: false,
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// All text parts joined, for logging and mock matching
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::File { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Processing state of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

/// A file held by the provider's file store
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
    /// Known for videos once processing is done
    pub video_duration_secs: Option<f64>,
}

/// Trait for text generation and the file store it reads from
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a response and return its text
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Upload media so it can be referenced from a prompt
    async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str, display_name: &str) -> Result<RemoteFile>;

    /// Fetch current metadata of an uploaded file
    async fn get_file(&self, name: &str) -> Result<RemoteFile>;

    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Decode JSON produced by the model, tolerating a Markdown code fence.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|e| AppError::MalformedModelOutput {
        message: format!("Failed to decode JSON: {}", e),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Create the generator and embedder based on configuration
pub fn create_clients(config: &GenAiConfig) -> Result<(Arc<dyn Generator>, Arc<dyn Embedder>)> {
    match config.provider.as_str() {
        "gemini" => {
            let client = Arc::new(GeminiClient::new(config)?);
            let generator: Arc<dyn Generator> = client.clone();
            let embedder: Arc<dyn Embedder> = client;
            Ok((generator, embedder))
        }
        "mock" => {
            let generator: Arc<dyn Generator> = Arc::new(MockGenerator::new());
            let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(config.dimension));
            Ok((generator, embedder))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown genai provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_parse_plain_json() {
        let value: Value = parse_json_response(r#"{"correctness": 1}"#).unwrap();
        assert_eq!(value["correctness"], 1);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"strength\": \"a\", \"weakness\": \"b\"}\n```";
        let value: Value = parse_json_response(text).unwrap();
        assert_eq!(value["weakness"], "b");

        let text = "```\n[1, 2]\n```\n";
        let value: Vec<u32> = parse_json_response(text).unwrap();
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_json_response::<Value>("not json").unwrap_err();
        assert!(matches!(err, AppError::MalformedModelOutput { .. }));
    }

    #[test]
    fn test_generation_request_builders() {
        let file = RemoteFile {
            name: "files/abc".into(),
            uri: "https://files/abc".into(),
            mime_type: "image/png".into(),
            state: FileState::Active,
            video_duration_secs: None,
        };
        let request = GenerationRequest::with_file(&file, "Summarise").timeout(Duration::from_secs(600));
        assert_eq!(request.parts.len(), 2);
        assert_eq!(request.prompt_text(), "Summarise");
        assert_eq!(request.timeout, Some(Duration::from_secs(600)));
        assert!(GenerationRequest::json("q").json);
    }

    #[test]
    fn test_create_mock_clients() {
        let config = GenAiConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        let (generator, embedder) = create_clients(&config).unwrap();
        assert_eq!(generator.model_name(), "mock-generator");
        assert_eq!(embedder.dimension(), 768);

        let config = GenAiConfig {
            provider: "unknown".into(),
            ..Default::default()
        };
        assert!(create_clients(&config).is_err());
    }
}
