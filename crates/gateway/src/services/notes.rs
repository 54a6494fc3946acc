//! Notes generation and storage
//!
//! Handles the notes workflow:
//! 1. Classify the upload by extension
//! 2. Media: upload to the model's file store, wait for processing, generate, delete
//! 3. Documents: extract text and generate from it
//! 4. Chunk, embed and store the generated notes

use super::prompts;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use studyowl_common::config::{ChunkStrategy, GenAiConfig, StudyConfig};
use studyowl_common::customisation::NotesCustomisation;
use studyowl_common::errors::{AppError, Result};
use studyowl_common::genai::{EmbedTask, FileState, GenerationRequest, RemoteFile};
use studyowl_common::store::{NewNote, NoteRecord};
use studyowl_common::{metrics, Embedder, Generator, StudyStore};
use studyowl_ingestion::{ChunkingStrategy, FileKind, IngestionError};
use tracing::{debug, info, warn};

pub const NO_NOTES_MESSAGE: &str =
    "Upload a file to get started. There is no documents available in our database to generate a quiz.";

/// Map extraction failures onto API errors
pub fn ingestion_error(err: IngestionError) -> AppError {
    match err {
        IngestionError::UnknownFileType { .. } | IngestionError::UnsupportedFormat { .. } => {
            AppError::UnsupportedFileType {
                message: err.to_string(),
            }
        }
        IngestionError::PdfParseError { .. }
        | IngestionError::OfficeParseError { .. }
        | IngestionError::EmptyDocument { .. } => AppError::InvalidFormat {
            message: err.to_string(),
        },
        IngestionError::IoError(e) => AppError::from(e),
    }
}

/// Notes produced from one upload
#[derive(Debug, Clone)]
pub struct GeneratedNotes {
    pub kind: FileKind,
    pub text: String,
}

pub struct NotesService {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn StudyStore>,
    generation_timeout: Duration,
    poll_interval: Duration,
    processing_timeout: Duration,
    max_video_duration_secs: f64,
    chunking: ChunkingStrategy,
    recent_window: ChronoDuration,
}

impl NotesService {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn StudyStore>,
        genai: &GenAiConfig,
        study: &StudyConfig,
    ) -> Self {
        let chunking = match study.chunk_strategy {
            ChunkStrategy::Sentences => ChunkingStrategy::Sentences(study.sentences_per_chunk),
            ChunkStrategy::Markdown => ChunkingStrategy::Markdown(study.markdown_chunk_chars),
        };

        Self {
            generator,
            embedder,
            store,
            generation_timeout: Duration::from_secs(genai.timeout_secs),
            poll_interval: Duration::from_secs(genai.file_poll_interval_secs),
            processing_timeout: Duration::from_secs(genai.file_processing_timeout_secs),
            max_video_duration_secs: genai.max_video_duration_secs,
            chunking,
            recent_window: ChronoDuration::minutes(study.recent_notes_window_minutes),
        }
    }

    /// Generate notes for an uploaded file
    pub async fn generate(&self, file_name: &str, bytes: Vec<u8>, prefs: &NotesCustomisation) -> Result<GeneratedNotes> {
        let kind = FileKind::from_file_name(file_name).map_err(ingestion_error)?;
        let extension = studyowl_ingestion::extension(file_name).unwrap_or_default();

        info!(file_kind = %kind, size_bytes = bytes.len(), "Generating notes");

        let text = if kind.is_media() {
            let mime_type = studyowl_ingestion::media_mime_type(&extension).ok_or_else(|| {
                AppError::UnsupportedFileType {
                    message: format!("Unsupported media type: .{}", extension),
                }
            })?;
            self.notes_from_media(kind, file_name, bytes, mime_type, prefs).await?
        } else {
            let extracted = studyowl_ingestion::extract_text(kind, &extension, &bytes).map_err(ingestion_error)?;
            let prompt = prompts::document_notes_prompt(kind.content_label(), prefs, &extracted);
            self.generator.generate(GenerationRequest::text(prompt)).await?
        };

        Ok(GeneratedNotes { kind, text })
    }

    /// The uploaded file is deleted from the file store whether or not generation succeeds
    async fn notes_from_media(
        &self,
        kind: FileKind,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        prefs: &NotesCustomisation,
    ) -> Result<String> {
        let uploaded = self.generator.upload_file(bytes, mime_type, file_name).await?;
        info!(file = %uploaded.name, mime_type, "Uploaded media file");

        let result = self.generate_from_remote(kind, &uploaded, prefs).await;

        match self.generator.delete_file(&uploaded.name).await {
            Ok(()) => info!(file = %uploaded.name, "Deleted media file"),
            Err(e) => warn!(file = %uploaded.name, error = %e, "Failed to delete media file"),
        }

        result
    }

    async fn generate_from_remote(&self, kind: FileKind, uploaded: &RemoteFile, prefs: &NotesCustomisation) -> Result<String> {
        let file = self.wait_until_processed(uploaded).await?;

        if file.state == FileState::Failed {
            return Err(AppError::Generation {
                message: format!("Processing of {} failed", file.name),
            });
        }

        if let Some(duration) = file.video_duration_secs {
            if duration >= self.max_video_duration_secs {
                info!(duration_secs = duration, "Video rejected as too long");
                return Err(AppError::validation(
                    "Video file is too long. Make sure it does not exceed 2 hours.",
                ));
            }
        }

        let prompt = prompts::media_notes_prompt(kind.content_label(), prefs);
        let request = GenerationRequest::with_file(&file, prompt).timeout(self.generation_timeout);
        self.generator.generate(request).await
    }

    async fn wait_until_processed(&self, uploaded: &RemoteFile) -> Result<RemoteFile> {
        let start = Instant::now();
        let mut file = uploaded.clone();

        while file.state == FileState::Processing {
            if start.elapsed() >= self.processing_timeout {
                return Err(AppError::Generation {
                    message: format!(
                        "File {} was still processing after {}s",
                        file.name,
                        self.processing_timeout.as_secs()
                    ),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            file = self.generator.get_file(&file.name).await?;
            debug!(file = %file.name, state = ?file.state, "Polled media file");
        }

        Ok(file)
    }

    /// Chunk, embed and store notes; returns the number of chunks stored
    pub async fn store(&self, user_id: &str, notes: &str) -> Result<usize> {
        let chunks = studyowl_ingestion::chunk_notes(notes, self.chunking);
        if chunks.is_empty() {
            warn!(user_id, "Generated notes produced no chunks");
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&chunks, EmbedTask::RetrievalDocument).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Embedding {
                message: format!("Expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            });
        }

        let new_notes: Vec<NewNote> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| NewNote { text, embedding })
            .collect();

        let stored = self.store.add_notes(user_id, new_notes).await?.len();
        info!(user_id, chunks = stored, "Stored note chunks");
        Ok(stored)
    }

    /// Generate and store in one step
    pub async fn generate_and_store(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        prefs: &NotesCustomisation,
    ) -> Result<String> {
        let notes = self.generate(file_name, bytes, prefs).await?;
        let chunks = self.store(user_id, &notes.text).await?;
        metrics::record_notes(notes.kind.as_str(), chunks);
        Ok(notes.text)
    }

    /// Text of the recently uploaded notes, or of every note when none are recent
    pub async fn recent_or_all(&self, user_id: &str) -> Result<String> {
        let since = Utc::now() - self.recent_window;
        let recent = join_notes(self.store.notes_since(user_id, since).await?);
        if !recent.trim().is_empty() {
            debug!(user_id, "Using recent notes");
            return Ok(recent);
        }

        let all = join_notes(self.store.all_notes(user_id).await?);
        if !all.trim().is_empty() {
            debug!(user_id, "No recent notes, using all notes");
            return Ok(all);
        }

        Err(AppError::NothingToProcess {
            message: NO_NOTES_MESSAGE.to_string(),
        })
    }
}

fn join_notes(notes: Vec<NoteRecord>) -> String {
    notes
        .into_iter()
        .map(|n| n.summarised_notes)
        .collect::<Vec<_>>()
        .join("\n")
}
