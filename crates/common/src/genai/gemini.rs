//! Gemini REST client
//!
//! Covers `:generateContent`, `:embedContent`, `:batchEmbedContents` and the
//! Files API (multipart upload, get, delete).

use super::{EmbedTask, Embedder, FileState, GenerationRequest, Generator, Part, RemoteFile};
use crate::config::GenAiConfig;
use crate::errors::{AppError, Result};
use crate::metrics::{record_embedding, record_generation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini supports at most this many texts per batch request
const EMBED_BATCH_SIZE: usize = 100;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: Value,
    #[serde(rename = "taskType")]
    task_type: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    state: Option<String>,
    video_metadata: Option<VideoMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoMetadata {
    video_duration: Option<String>,
}

impl From<FileResource> for RemoteFile {
    fn from(resource: FileResource) -> Self {
        let state = match resource.state.as_deref() {
            Some("ACTIVE") => FileState::Active,
            Some("FAILED") => FileState::Failed,
            _ => FileState::Processing,
        };
        let video_duration_secs = resource
            .video_metadata
            .and_then(|m| m.video_duration)
            .and_then(|d| parse_duration_secs(&d));

        RemoteFile {
            name: resource.name,
            uri: resource.uri,
            mime_type: resource.mime_type,
            state,
            video_duration_secs,
        }
    }
}

/// Parse a protobuf JSON duration such as `"3725.5s"`
fn parse_duration_secs(value: &str) -> Option<f64> {
    value.trim().strip_suffix('s')?.parse().ok()
}

impl GeminiClient {
    pub fn new(config: &GenAiConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "genai.api_key is required for the gemini provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            dimension: config.dimension,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    fn generate_body(request: &GenerationRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::File { uri, mime_type } => json!({
                    "fileData": { "mimeType": mime_type, "fileUri": uri }
                }),
            })
            .collect();

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });
        if request.json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }

    async fn call_generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut builder = self
            .client
            .post(self.model_url(&self.model, "generateContent"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Self::generate_body(request));
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| AppError::Generation {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: GenerateResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse response: {}", e),
        })?;

        if let Some(reason) = result.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::Generation {
                message: format!("Prompt blocked: {}", reason),
            });
        }

        let candidate = result.candidates.into_iter().next().ok_or_else(|| AppError::Generation {
            message: "Empty response from model".to_string(),
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::Generation {
                message: format!(
                    "Model returned no text (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }

        Ok(text)
    }

    fn embed_request(&self, text: &str, task: EmbedTask) -> EmbedRequest {
        EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: json!({ "parts": [{ "text": text }] }),
            task_type: task.as_api_str(),
        }
    }

    async fn post_embedding<T: serde::de::DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T> {
        let response = self
            .client
            .post(self.model_url(&self.embedding_model, method))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Embedding {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::Embedding {
            message: format!("Failed to parse response: {}", e),
        })
    }

    async fn file_request(&self, method: reqwest::Method, name: &str) -> Result<reqwest::Response> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let response = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("File request failed: {}", e),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound {
                resource_type: "file".to_string(),
                id: name.to_string(),
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("File API error {}: {}", status, body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let kind = if request.json { "json" } else { "text" };

        let result = self.call_generate(&request).await;
        record_generation(start.elapsed().as_secs_f64(), &self.model, kind, result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(model = %self.model, error = %e, "Generation failed");
        }
        result
    }

    async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str, display_name: &str) -> Result<RemoteFile> {
        let boundary = format!("studyowl-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "file": { "display_name": display_name } });

        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
                b = boundary,
                m = metadata,
                t = mime_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "multipart")
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Upload failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("Upload error {}: {}", status, body),
            });
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse upload response: {}", e),
        })?;

        tracing::info!(file = %uploaded.file.name, mime_type = mime_type, "Uploaded file");
        Ok(uploaded.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self.file_request(reqwest::Method::GET, name).await?;
        let resource: FileResource = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse file metadata: {}", e),
        })?;
        Ok(resource.into())
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.file_request(reqwest::Method::DELETE, name).await?;
        tracing::info!(file = name, "Deleted file");
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result: Result<EmbedResponse> = self
            .post_embedding("embedContent", &self.embed_request(text, task))
            .await;
        record_embedding(start.elapsed().as_secs_f64(), &self.embedding_model, 1, result.is_ok());

        Ok(result?.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let requests: Vec<EmbedRequest> = chunk.iter().map(|t| self.embed_request(t, task)).collect();
            let start = Instant::now();
            let result: Result<BatchEmbedResponse> = self
                .post_embedding("batchEmbedContents", &json!({ "requests": requests }))
                .await;
            record_embedding(start.elapsed().as_secs_f64(), &self.embedding_model, chunk.len(), result.is_ok());

            let embeddings = result?.embeddings;
            if embeddings.len() != chunk.len() {
                return Err(AppError::Embedding {
                    message: format!("Expected {} embeddings, got {}", chunk.len(), embeddings.len()),
                });
            }
            all_embeddings.extend(embeddings.into_iter().map(|e| e.values));
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
