//! Quiz generation from stored notes

use super::notes::NotesService;
use super::prompts;
use serde_json::Value;
use std::sync::Arc;
use studyowl_common::config::StudyConfig;
use studyowl_common::customisation::QuizCustomisationRequest;
use studyowl_common::errors::{AppError, Result};
use studyowl_common::genai::{parse_json_response, GenerationRequest};
use studyowl_common::quiz::{parse_quiz, QuizQuestion, StrengthWeakness};
use studyowl_common::{metrics, Generator, StudyStore};
use tracing::info;

pub struct QuizService {
    generator: Arc<dyn Generator>,
    store: Arc<dyn StudyStore>,
    notes: Arc<NotesService>,
    default_questions: u32,
    max_questions: u32,
}

impl QuizService {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn StudyStore>,
        notes: Arc<NotesService>,
        study: &StudyConfig,
    ) -> Self {
        Self {
            generator,
            store,
            notes,
            default_questions: study.default_quiz_questions,
            max_questions: study.max_quiz_questions,
        }
    }

    /// Quiz over the user's recent notes (or all notes)
    pub async fn generate(&self, user_id: &str, request: &QuizCustomisationRequest) -> Result<Vec<QuizQuestion>> {
        request.check_limit(self.max_questions)?;
        let content = self.notes.recent_or_all(user_id).await?;
        let prefs = request.resolve_with_limits(self.default_questions, self.max_questions);
        let prompt = prompts::quiz_prompt(&prefs, &content);

        self.run(user_id, prompt, false).await
    }

    /// Quiz that concentrates on the weaknesses from a previous assessment
    pub async fn regenerate(
        &self,
        user_id: &str,
        request: &QuizCustomisationRequest,
        assessment: &StrengthWeakness,
    ) -> Result<Vec<QuizQuestion>> {
        request.check_limit(self.max_questions)?;
        let content = self.notes.recent_or_all(user_id).await?;
        let prefs = request.resolve_with_limits(self.default_questions, self.max_questions);
        let prompt = prompts::regenerate_quiz_prompt(&prefs, &content, assessment);

        self.run(user_id, prompt, true).await
    }

    async fn run(&self, user_id: &str, prompt: String, regenerated: bool) -> Result<Vec<QuizQuestion>> {
        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let value: Value = parse_json_response(&response)?;
        let questions = parse_quiz(&value).map_err(|e| AppError::MalformedModelOutput {
            message: e.to_string(),
        })?;

        self.store.add_quiz_items(user_id, &questions).await?;
        metrics::record_quiz(regenerated, questions.len());

        info!(user_id, questions = questions.len(), regenerated, "Quiz generated");
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use studyowl_common::genai::{MockEmbedder, MockGenerator};
    use studyowl_common::store::MemoryStore;
    use studyowl_common::AppConfig;

    fn service() -> (Arc<MockGenerator>, Arc<MemoryStore>, Arc<NotesService>, QuizService) {
        service_with(|_| {})
    }

    fn service_with(
        customise: impl FnOnce(&mut AppConfig),
    ) -> (Arc<MockGenerator>, Arc<MemoryStore>, Arc<NotesService>, QuizService) {
        let mut config = AppConfig::for_local_development();
        customise(&mut config);
        let generator = Arc::new(MockGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let notes = Arc::new(NotesService::new(
            generator.clone(),
            Arc::new(MockEmbedder::new(16)),
            store.clone(),
            &config.genai,
            &config.study,
        ));
        let quiz = QuizService::new(generator.clone(), store.clone(), notes.clone(), &config.study);
        (generator, store, notes, quiz)
    }

    #[tokio::test]
    async fn test_quiz_requires_notes() {
        let (_, _, _, quiz) = service();
        let err = quiz.generate("alice", &QuizCustomisationRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NothingToProcess { .. }));
    }

    #[tokio::test]
    async fn test_quiz_generated_and_stored() {
        let (generator, store, notes, quiz) = service();
        notes.store("alice", "Mitochondria produce energy.").await.unwrap();

        let questions = quiz.generate("alice", &QuizCustomisationRequest::default()).await.unwrap();
        assert_eq!(questions.len(), 2);

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.starts_with("Please generate 10 quiz questions"));
        assert!(prompt.ends_with("Mitochondria produce energy."));

        let stored = store.quiz_items_since("alice", Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|i| !i.is_answered()));
    }

    #[tokio::test]
    async fn test_malformed_quiz_is_upstream_error() {
        let (generator, _, notes, quiz) = service();
        notes.store("alice", "Some notes.").await.unwrap();
        generator.push_response(r#"{"question_answer_list": [{"question": "No answer"}]}"#);

        let err = quiz.generate("alice", &QuizCustomisationRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedModelOutput { .. }));
    }

    #[tokio::test]
    async fn test_regenerate_includes_assessment() {
        let (generator, _, notes, quiz) = service();
        notes.store("alice", "Some notes.").await.unwrap();
        let assessment = StrengthWeakness {
            strength: "Vocabulary".into(),
            weakness: "Dates".into(),
        };

        quiz.regenerate("alice", &QuizCustomisationRequest::default(), &assessment)
            .await
            .unwrap();
        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains("Student's Weaknesses:\n- Dates"));
    }

    #[tokio::test]
    async fn test_quiz_size_limit_from_config() {
        let (generator, _, notes, quiz) = service_with(|config| config.study.max_quiz_questions = 5);
        notes.store("alice", "Some notes.").await.unwrap();

        let request = QuizCustomisationRequest {
            number_of_questions: Some(6),
            ..Default::default()
        };
        let err = quiz.generate("alice", &request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field.as_deref() == Some("number_of_questions")));
        assert!(generator.requests().is_empty());

        let request = QuizCustomisationRequest {
            number_of_questions: Some(5),
            ..Default::default()
        };
        quiz.generate("alice", &request).await.unwrap();
        assert!(generator.last_prompt().unwrap().starts_with("Please generate 5 quiz questions"));
    }
}
