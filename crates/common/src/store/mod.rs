//! Per-user document store
//!
//! Each user owns three collections: their user record, note chunks with
//! embeddings, and quiz questions with the answers given to them.
//! `Repository` keeps them in Postgres with pgvector; `MemoryStore` keeps
//! them in process.

mod memory;

pub use memory::MemoryStore;

use crate::config::{AppConfig, StoreBackend};
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use crate::quiz::{QuizQuestion, StudentAnswer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// A note chunk to persist
#[derive(Debug, Clone)]
pub struct NewNote {
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteRecord {
    pub id: Uuid,
    pub user_id: String,
    pub summarised_notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizItemRecord {
    pub id: Uuid,
    pub user_id: String,
    pub question: QuizQuestion,
    pub student_answer: Option<StudentAnswer>,
    pub correctness: Option<i32>,
    pub created_at: DateTime<Utc>,
    /// Refreshed whenever the question is answered
    pub updated_at: DateTime<Utc>,
}

impl QuizItemRecord {
    pub fn is_answered(&self) -> bool {
        self.student_answer.is_some() && self.correctness.is_some()
    }
}

/// Largest batch a collection delete accepts
pub const MAX_DELETE_BATCH_SIZE: u64 = 10_000;

/// Reject batch sizes no backend can express as a row limit
pub fn check_batch_size(batch_size: u64) -> Result<()> {
    if batch_size > MAX_DELETE_BATCH_SIZE {
        return Err(AppError::Validation {
            message: format!("batch_size must be at most {}", MAX_DELETE_BATCH_SIZE),
            field: Some("batch_size".to_string()),
        });
    }
    Ok(())
}

/// Collections a user can clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Notes,
    QuizQuestions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Notes => "notes",
            Collection::QuizQuestions => "quiz_qn_and_ans",
        }
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "users" => Ok(Collection::Users),
            "notes" => Ok(Collection::Notes),
            "quiz_qn_and_ans" => Ok(Collection::QuizQuestions),
            other => Err(AppError::Validation {
                message: format!(
                    "Unknown collection '{}', expected users, notes or quiz_qn_and_ans",
                    other
                ),
                field: Some("coll_name".to_string()),
            }),
        }
    }
}

/// Storage for a user's notes and quiz history
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Create the user record if it does not exist yet
    async fn ensure_user(&self, user_id: &str, email: &str) -> Result<()>;

    /// Persist note chunks, all stamped with the same time
    async fn add_notes(&self, user_id: &str, notes: Vec<NewNote>) -> Result<Vec<NoteRecord>>;

    /// Notes created at or after `since`, oldest first
    async fn notes_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<NoteRecord>>;

    /// Every note, oldest first
    async fn all_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>>;

    /// The `limit` notes closest to `embedding` by Euclidean distance
    async fn nearest_notes(&self, user_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<NoteRecord>>;

    async fn add_quiz_items(&self, user_id: &str, questions: &[QuizQuestion]) -> Result<Vec<QuizItemRecord>>;

    /// Record an answer on every quiz item asking `question`.
    ///
    /// Returns the number of items updated.
    async fn record_answer(
        &self,
        user_id: &str,
        question: &str,
        student_answer: &StudentAnswer,
        correctness: i32,
    ) -> Result<u64>;

    /// Quiz items created or answered at or after `since`
    async fn quiz_items_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<QuizItemRecord>>;

    /// Delete a collection in batches of `batch_size`, returning rows removed
    async fn delete_collection(&self, user_id: &str, collection: Collection, batch_size: u64) -> Result<u64>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Euclidean (L2) distance; vectors of different length compare as infinitely far
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Create the store selected by configuration
pub async fn create_store(config: &AppConfig) -> Result<Arc<dyn StudyStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory study store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DbPool::new(&config.database).await?;
            if config.database.run_migrations {
                pool.run_migrations(config.genai.dimension).await?;
            }
            pool.check_embedding_dimension(config.genai.dimension).await?;
            Ok(Arc::new(Repository::new(pool, config.genai.dimension)))
        }
    }
}
