//! In-process stand-ins for the generative API

use super::{EmbedTask, Embedder, FileState, GenerationRequest, Generator, RemoteFile};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Mock generator for testing and local runs
///
/// Responses queued with `push_response` are returned in order; once the
/// queue is empty every call gets a canned text. Uploaded files become
/// active immediately unless states are scripted with `push_file_state`.
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<GenerationRequest>>,
    files: Mutex<HashMap<String, RemoteFile>>,
    scripted_states: Mutex<VecDeque<(FileState, Option<f64>)>>,
    deleted: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            scripted_states: Mutex::new(VecDeque::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for response in responses {
            generator.push_response(response);
        }
        generator
    }

    pub fn push_response(&self, response: impl Into<String>) {
        lock(&self.responses).push_back(Ok(response.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        lock(&self.responses).push_back(Err(AppError::Generation {
            message: message.into(),
        }));
    }

    /// Script what successive `get_file` calls report
    pub fn push_file_state(&self, state: FileState, video_duration_secs: Option<f64>) {
        lock(&self.scripted_states).push_back((state, video_duration_secs));
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.prompts).clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.prompts).last().map(GenerationRequest::prompt_text)
    }

    pub fn deleted_files(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    fn canned_response(request: &GenerationRequest) -> String {
        let prompt = request.prompt_text();
        if request.json {
            return Self::canned_json(&prompt).to_string();
        }
        let first_line = prompt.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        format!(
            "# Notes\n\n- {}\n\n[Mock response - generative API not configured]",
            first_line
        )
    }

    // Shaped after whichever schema the prompt asks for
    fn canned_json(prompt: &str) -> serde_json::Value {
        if prompt.contains("question_answer_list") {
            serde_json::json!({
                "question_answer_list": [
                    {
                        "question": "Which statement best summarises the notes?",
                        "choices": ["The first point", "An unrelated claim"],
                        "answer": 0,
                        "explanation": "It is the main point of the notes."
                    },
                    {
                        "question": "The notes were generated locally.",
                        "choices": ["True", "False"],
                        "answer": "True",
                        "explanation": "The generative API is not configured."
                    }
                ]
            })
        } else if prompt.contains("\"correctness\"") {
            serde_json::json!({ "correctness": 1 })
        } else if prompt.contains("\"strength\"") {
            serde_json::json!({
                "strength": "You recall the key points well.",
                "weakness": "Review the details you missed."
            })
        } else {
            serde_json::json!({})
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let scripted = lock(&self.responses).pop_front();
        let response = match scripted {
            Some(response) => response,
            None => Ok(Self::canned_response(&request)),
        };
        lock(&self.prompts).push(request);
        response
    }

    async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str, display_name: &str) -> Result<RemoteFile> {
        let digest = hex::encode(Sha256::digest(&bytes));
        let name = format!("files/{}", &digest[..12]);
        let file = RemoteFile {
            name: name.clone(),
            uri: format!("mock://{}/{}", name, display_name),
            mime_type: mime_type.to_string(),
            state: FileState::Processing,
            video_duration_secs: None,
        };
        lock(&self.files).insert(name, file.clone());
        Ok(file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let mut files = lock(&self.files);
        let file = files.get_mut(name).ok_or_else(|| AppError::NotFound {
            resource_type: "file".to_string(),
            id: name.to_string(),
        })?;

        match lock(&self.scripted_states).pop_front() {
            Some((state, duration)) => {
                file.state = state;
                file.video_duration_secs = duration;
            }
            None if file.state == FileState::Processing => file.state = FileState::Active,
            None => {}
        }
        Ok(file.clone())
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let removed = lock(&self.files).remove(name);
        if removed.is_none() {
            return Err(AppError::NotFound {
                resource_type: "file".to_string(),
                id: name.to_string(),
            });
        }
        lock(&self.deleted).push(name.to_string());
        Ok(())
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Mock embedder for testing
///
/// Hashes lower-cased words into buckets and L2-normalises the result, so
/// texts sharing vocabulary land close together.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
            ]) as usize
                % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, _task: EmbedTask) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
