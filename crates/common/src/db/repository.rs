//! Postgres-backed study store
//!
//! Plain columns go through SeaORM entities; anything touching the pgvector
//! `embedding` column uses raw SQL.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::quiz::{QuizQuestion, StudentAnswer};
use crate::store::{check_batch_size, Collection, NewNote, NoteRecord, QuizItemRecord, StudyStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
    dimension: usize,
}

/// Convert an embedding to pgvector's text format "[1.0,2.0,...]"
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(AppError::Embedding {
                message: format!(
                    "Embedding has {} dimensions, store expects {}",
                    embedding.len(),
                    self.dimension
                ),
            });
        }
        Ok(())
    }

    /// Delete a user's rows from `table` in batches until a short batch comes back
    async fn delete_in_batches(&self, table: &'static str, user_id: &str, batch_size: u64) -> Result<u64> {
        let limit = i64::try_from(batch_size).map_err(|_| AppError::validation("batch_size is out of range"))?;
        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE id IN (
                SELECT id FROM {table} WHERE user_id = $1 LIMIT $2
            )
            "#
        );

        let mut total = 0;
        loop {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![user_id.into(), limit.into()],
            );
            let deleted = self.write_conn().execute(stmt).await?.rows_affected();
            total += deleted;
            tracing::debug!(table, deleted, "Deleted batch");
            if deleted < batch_size {
                break;
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StudyStore for Repository {
    async fn ensure_user(&self, user_id: &str, email: &str) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO users (id, email, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
            vec![user_id.into(), email.into()],
        );
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    async fn add_notes(&self, user_id: &str, notes: Vec<NewNote>) -> Result<Vec<NoteRecord>> {
        let now = Utc::now();
        let mut records = Vec::with_capacity(notes.len());

        for note in notes {
            self.check_dimension(&note.embedding)?;
            let id = Uuid::new_v4();

            // Use raw SQL for pgvector type
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO notes (id, user_id, summarised_notes, embedding, created_at)
                VALUES ($1, $2, $3, $4::vector, $5)
                "#,
                vec![
                    id.into(),
                    user_id.into(),
                    note.text.clone().into(),
                    vector_literal(&note.embedding).into(),
                    now.into(),
                ],
            );
            self.write_conn().execute(stmt).await?;

            records.push(NoteRecord {
                id,
                user_id: user_id.to_string(),
                summarised_notes: note.text,
                created_at: now,
            });
        }

        Ok(records)
    }

    async fn notes_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<NoteRecord>> {
        let notes = NoteEntity::find()
            .filter(NoteColumn::UserId.eq(user_id))
            .filter(NoteColumn::CreatedAt.gte(since))
            .order_by_asc(NoteColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        Ok(notes.into_iter().map(Into::into).collect())
    }

    async fn all_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>> {
        let notes = NoteEntity::find()
            .filter(NoteColumn::UserId.eq(user_id))
            .order_by_asc(NoteColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        Ok(notes.into_iter().map(Into::into).collect())
    }

    async fn nearest_notes(&self, user_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<NoteRecord>> {
        self.check_dimension(embedding)?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT id, user_id, summarised_notes, created_at
            FROM notes
            WHERE user_id = $1
            ORDER BY embedding <-> $2::vector
            LIMIT $3
            "#,
            vec![
                user_id.into(),
                vector_literal(embedding).into(),
                i64::try_from(limit).unwrap_or(i64::MAX).into(),
            ],
        );

        let results = self
            .read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                let created_at: sea_orm::prelude::DateTimeWithTimeZone = row.try_get_by_index(3).ok()?;
                Some(NoteRecord {
                    id: row.try_get_by_index::<Uuid>(0).ok()?,
                    user_id: row.try_get_by_index::<String>(1).ok()?,
                    summarised_notes: row.try_get_by_index::<String>(2).ok()?,
                    created_at: created_at.into(),
                })
            })
            .collect();

        Ok(results)
    }

    async fn add_quiz_items(&self, user_id: &str, questions: &[QuizQuestion]) -> Result<Vec<QuizItemRecord>> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut records = Vec::with_capacity(questions.len());
        let mut models = Vec::with_capacity(questions.len());

        for question in questions {
            let id = Uuid::new_v4();
            models.push(QuizItemActiveModel {
                id: Set(id),
                user_id: Set(user_id.to_string()),
                question: Set(question.question().to_string()),
                item: Set(serde_json::to_value(question)?),
                student_answer: Set(None),
                correctness: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            });
            records.push(QuizItemRecord {
                id,
                user_id: user_id.to_string(),
                question: question.clone(),
                student_answer: None,
                correctness: None,
                created_at: now,
                updated_at: now,
            });
        }

        QuizItemEntity::insert_many(models).exec(self.write_conn()).await?;
        Ok(records)
    }

    async fn record_answer(
        &self,
        user_id: &str,
        question: &str,
        student_answer: &StudentAnswer,
        correctness: i32,
    ) -> Result<u64> {
        let result = QuizItemEntity::update_many()
            .col_expr(QuizItemColumn::StudentAnswer, Expr::value(serde_json::to_value(student_answer)?))
            .col_expr(QuizItemColumn::Correctness, Expr::value(correctness))
            .col_expr(QuizItemColumn::UpdatedAt, Expr::value(Utc::now()))
            .filter(QuizItemColumn::UserId.eq(user_id))
            .filter(QuizItemColumn::Question.eq(question))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected)
    }

    async fn quiz_items_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<QuizItemRecord>> {
        QuizItemEntity::find()
            .filter(QuizItemColumn::UserId.eq(user_id))
            .filter(QuizItemColumn::UpdatedAt.gte(since))
            .order_by_asc(QuizItemColumn::CreatedAt)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(QuizItemRecord::try_from)
            .collect()
    }

    async fn delete_collection(&self, user_id: &str, collection: Collection, batch_size: u64) -> Result<u64> {
        check_batch_size(batch_size)?;
        if batch_size == 0 {
            return Ok(0);
        }

        match collection {
            Collection::Notes => self.delete_in_batches("notes", user_id, batch_size).await,
            Collection::QuizQuestions => self.delete_in_batches("quiz_items", user_id, batch_size).await,
            Collection::Users => {
                let mut total = self.delete_in_batches("notes", user_id, batch_size).await?;
                total += self.delete_in_batches("quiz_items", user_id, batch_size).await?;
                total += UserEntity::delete_by_id(user_id.to_string())
                    .exec(self.write_conn())
                    .await?
                    .rows_affected;
                Ok(total)
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
