//! Question answering over a user's notes

use super::prompts;
use std::sync::Arc;
use studyowl_common::errors::Result;
use studyowl_common::genai::{EmbedTask, GenerationRequest};
use studyowl_common::{Embedder, Generator, StudyStore};
use tracing::info;

pub struct QueryService {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn StudyStore>,
    limit: usize,
}

impl QueryService {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn StudyStore>,
        limit: usize,
    ) -> Self {
        Self {
            generator,
            embedder,
            store,
            limit,
        }
    }

    /// Answer from the note chunks nearest to the query
    pub async fn answer(&self, user_id: &str, query: &str) -> Result<String> {
        let embedding = self.embedder.embed(query, EmbedTask::RetrievalQuery).await?;
        let notes = self.store.nearest_notes(user_id, &embedding, self.limit).await?;
        info!(user_id, retrieved = notes.len(), "Retrieved notes for query");

        let relevant = notes
            .into_iter()
            .map(|n| n.summarised_notes)
            .collect::<Vec<_>>()
            .join("\n\n ");

        let prompt = prompts::query_prompt(query, &relevant);
        self.generator.generate(GenerationRequest::text(prompt)).await
    }
}
