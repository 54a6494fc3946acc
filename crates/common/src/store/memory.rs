//! In-process study store

use super::{check_batch_size, euclidean_distance, Collection, NewNote, NoteRecord, QuizItemRecord, StudyStore};
use crate::errors::Result;
use crate::quiz::{QuizQuestion, StudentAnswer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct UserData {
    email: Option<String>,
    notes: Vec<(NoteRecord, Vec<f32>)>,
    quiz_items: Vec<QuizItemRecord>,
}

/// Study store kept in memory, for development and tests
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a user record exists
    pub async fn has_user(&self, user_id: &str) -> bool {
        self.users
            .read()
            .await
            .get(user_id)
            .is_some_and(|u| u.email.is_some())
    }
}

#[async_trait]
impl StudyStore for MemoryStore {
    async fn ensure_user(&self, user_id: &str, email: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users.entry(user_id.to_string()).or_default();
        if user.email.is_none() {
            user.email = Some(email.to_string());
        }
        Ok(())
    }

    async fn add_notes(&self, user_id: &str, notes: Vec<NewNote>) -> Result<Vec<NoteRecord>> {
        let now = Utc::now();
        let mut users = self.users.write().await;
        let user = users.entry(user_id.to_string()).or_default();

        let mut records = Vec::with_capacity(notes.len());
        for note in notes {
            let record = NoteRecord {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                summarised_notes: note.text,
                created_at: now,
            };
            user.notes.push((record.clone(), note.embedding));
            records.push(record);
        }
        Ok(records)
    }

    async fn notes_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<NoteRecord>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| {
                u.notes
                    .iter()
                    .filter(|(n, _)| n.created_at >= since)
                    .map(|(n, _)| n.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| u.notes.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default())
    }

    async fn nearest_notes(&self, user_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<NoteRecord>> {
        let users = self.users.read().await;
        let Some(user) = users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &NoteRecord)> = user
            .notes
            .iter()
            .map(|(note, vector)| (euclidean_distance(vector, embedding), note))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored.into_iter().take(limit).map(|(_, n)| n.clone()).collect())
    }

    async fn add_quiz_items(&self, user_id: &str, questions: &[QuizQuestion]) -> Result<Vec<QuizItemRecord>> {
        let now = Utc::now();
        let mut users = self.users.write().await;
        let user = users.entry(user_id.to_string()).or_default();

        let records: Vec<QuizItemRecord> = questions
            .iter()
            .map(|question| QuizItemRecord {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                question: question.clone(),
                student_answer: None,
                correctness: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        user.quiz_items.extend(records.iter().cloned());
        Ok(records)
    }

    async fn record_answer(
        &self,
        user_id: &str,
        question: &str,
        student_answer: &StudentAnswer,
        correctness: i32,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(0);
        };

        let mut updated = 0;
        for item in user.quiz_items.iter_mut().filter(|i| i.question.question() == question) {
            item.student_answer = Some(student_answer.clone());
            item.correctness = Some(correctness);
            item.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn quiz_items_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<QuizItemRecord>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| {
                u.quiz_items
                    .iter()
                    .filter(|i| i.updated_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_collection(&self, user_id: &str, collection: Collection, batch_size: u64) -> Result<u64> {
        check_batch_size(batch_size)?;
        if batch_size == 0 {
            return Ok(0);
        }

        let mut users = self.users.write().await;
        let deleted = match collection {
            Collection::Users => users
                .remove(user_id)
                .map(|u| 1 + u.notes.len() as u64 + u.quiz_items.len() as u64)
                .unwrap_or(0),
            Collection::Notes => users
                .get_mut(user_id)
                .map(|u| u.notes.drain(..).count() as u64)
                .unwrap_or(0),
            Collection::QuizQuestions => users
                .get_mut(user_id)
                .map(|u| u.quiz_items.drain(..).count() as u64)
                .unwrap_or(0),
        };
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
