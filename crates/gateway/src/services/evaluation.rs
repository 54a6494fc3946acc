//! Answer grading and strength/weakness assessment

use super::prompts;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use studyowl_common::errors::{AppError, Result};
use studyowl_common::genai::{parse_json_response, GenerationRequest};
use studyowl_common::quiz::{calculate_score, Correctness, QuizQuestion, StrengthWeakness, StudentAnswer};
use studyowl_common::{metrics, Generator, StudyStore};
use tracing::{debug, info};

pub const NO_RECENT_QUIZ_MESSAGE: &str =
    "There is no recently answered quizzes. Answer a quiz before getting your score.";
pub const NO_ANSWERS_MESSAGE: &str =
    "You did not answer any questions. Answer the quiz before getting your score and evaluation.";

/// Score and the model's assessment of the latest answers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Assessment {
    pub score: u32,
    pub strength: String,
    pub weakness: String,
}

fn question_kind(question: &QuizQuestion) -> &'static str {
    match question {
        QuizQuestion::MultipleChoice { .. } => "multiple_choice",
        QuizQuestion::MultiSelect { .. } => "multi_select",
        QuizQuestion::TrueFalse { .. } => "true_false",
        QuizQuestion::FreeResponse { .. } => "free_response",
    }
}

pub struct EvaluationService {
    generator: Arc<dyn Generator>,
    store: Arc<dyn StudyStore>,
}

impl EvaluationService {
    pub fn new(generator: Arc<dyn Generator>, store: Arc<dyn StudyStore>) -> Self {
        Self { generator, store }
    }

    /// Grade an answer and record it against the user's quiz history
    pub async fn evaluate_answer(
        &self,
        user_id: &str,
        question: &QuizQuestion,
        student_answer: &StudentAnswer,
    ) -> Result<Correctness> {
        let correctness = match question.check_choice_answer(student_answer) {
            Some(correct) => Correctness::from_bool(correct),
            None => self.grade_free_response(question, student_answer).await?,
        };

        let updated = self
            .store
            .record_answer(user_id, question.question(), student_answer, correctness.correctness)
            .await?;
        if updated == 0 {
            debug!(user_id, "Answered question is not in the quiz history");
        }

        metrics::record_answer(question_kind(question), correctness.is_correct());
        Ok(correctness)
    }

    async fn grade_free_response(&self, question: &QuizQuestion, student_answer: &StudentAnswer) -> Result<Correctness> {
        let prompt = prompts::grading_prompt(
            question.question(),
            &student_answer.to_string(),
            &question.answer_text(),
        );
        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let correctness: Correctness = parse_json_response(&response)?;

        if !matches!(correctness.correctness, 0 | 1) {
            return Err(AppError::MalformedModelOutput {
                message: format!("correctness must be 0 or 1, got {}", correctness.correctness),
            });
        }
        Ok(correctness)
    }

    /// Score the latest `num_of_qns` answers and ask the model for an assessment
    ///
    /// Only quiz items touched in the last `num_of_qns * 2` minutes count.
    pub async fn strength_weakness(&self, user_id: &str, num_of_qns: u32) -> Result<Assessment> {
        let since = Utc::now() - Duration::minutes(i64::from(num_of_qns) * 2);
        let items = self.store.quiz_items_since(user_id, since).await?;
        if items.is_empty() {
            return Err(AppError::NothingToProcess {
                message: NO_RECENT_QUIZ_MESSAGE.to_string(),
            });
        }

        let mut answered: Vec<_> = items.into_iter().filter(|i| i.is_answered()).collect();
        if answered.is_empty() {
            return Err(AppError::NothingToProcess {
                message: NO_ANSWERS_MESSAGE.to_string(),
            });
        }

        answered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        answered.truncate(num_of_qns as usize);

        let correct = answered.iter().filter(|i| i.correctness == Some(1)).count();
        let score = calculate_score(correct, answered.len());
        info!(user_id, answered = answered.len(), correct, score, "Calculated quiz score");

        let prompt = prompts::assessment_prompt(&answered);
        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let StrengthWeakness { strength, weakness } = parse_json_response(&response)?;

        Ok(Assessment {
            score,
            strength,
            weakness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use studyowl_common::genai::MockGenerator;
    use studyowl_common::quiz::TrueFalse;
    use studyowl_common::store::{Collection, MemoryStore, NewNote, NoteRecord, QuizItemRecord};
    use uuid::Uuid;

    /// Serves a fixed quiz history with caller-chosen timestamps
    struct History {
        inner: MemoryStore,
        items: Vec<QuizItemRecord>,
    }

    #[async_trait]
    impl StudyStore for History {
        async fn ensure_user(&self, user_id: &str, email: &str) -> Result<()> {
            self.inner.ensure_user(user_id, email).await
        }

        async fn add_notes(&self, user_id: &str, notes: Vec<NewNote>) -> Result<Vec<NoteRecord>> {
            self.inner.add_notes(user_id, notes).await
        }

        async fn notes_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<NoteRecord>> {
            self.inner.notes_since(user_id, since).await
        }

        async fn all_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>> {
            self.inner.all_notes(user_id).await
        }

        async fn nearest_notes(&self, user_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<NoteRecord>> {
            self.inner.nearest_notes(user_id, embedding, limit).await
        }

        async fn add_quiz_items(&self, user_id: &str, questions: &[QuizQuestion]) -> Result<Vec<QuizItemRecord>> {
            self.inner.add_quiz_items(user_id, questions).await
        }

        async fn record_answer(
            &self,
            user_id: &str,
            question: &str,
            student_answer: &StudentAnswer,
            correctness: i32,
        ) -> Result<u64> {
            self.inner.record_answer(user_id, question, student_answer, correctness).await
        }

        async fn quiz_items_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<QuizItemRecord>> {
            Ok(self
                .items
                .iter()
                .filter(|i| i.user_id == user_id && i.updated_at >= since)
                .cloned()
                .collect())
        }

        async fn delete_collection(&self, user_id: &str, collection: Collection, batch_size: u64) -> Result<u64> {
            self.inner.delete_collection(user_id, collection, batch_size).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn answered(question: &str, correctness: i32, minutes_ago: i64) -> QuizItemRecord {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        QuizItemRecord {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            question: multiple_choice(question),
            student_answer: Some(StudentAnswer::Index(correctness as usize)),
            correctness: Some(correctness),
            created_at: at,
            updated_at: at,
        }
    }

    fn service() -> (Arc<MockGenerator>, Arc<MemoryStore>, EvaluationService) {
        let generator = Arc::new(MockGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let service = EvaluationService::new(generator.clone(), store.clone());
        (generator, store, service)
    }

    fn multiple_choice(question: &str) -> QuizQuestion {
        QuizQuestion::MultipleChoice {
            question: question.to_string(),
            choices: vec!["a".into(), "b".into(), "c".into()],
            answer: 1,
            explanation: None,
        }
    }

    fn free_response() -> QuizQuestion {
        QuizQuestion::FreeResponse {
            question: "Define osmosis".into(),
            answer: "Diffusion of water across a membrane".into(),
            explanation: None,
        }
    }

    #[tokio::test]
    async fn test_choice_answers_graded_locally() {
        let (generator, _, service) = service();

        let right = service
            .evaluate_answer("alice", &multiple_choice("q"), &StudentAnswer::Index(1))
            .await
            .unwrap();
        let wrong = service
            .evaluate_answer("alice", &multiple_choice("q"), &StudentAnswer::Index(2))
            .await
            .unwrap();
        let tf = QuizQuestion::TrueFalse {
            question: "Sky is blue".into(),
            choices: vec!["True".into(), "False".into()],
            answer: TrueFalse::True,
            explanation: None,
        };
        let tf_right = service
            .evaluate_answer("alice", &tf, &StudentAnswer::Text("True".into()))
            .await
            .unwrap();

        assert_eq!(right.correctness, 1);
        assert_eq!(wrong.correctness, 0);
        assert_eq!(tf_right.correctness, 1);
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn test_free_response_graded_by_model() {
        let generator = Arc::new(MockGenerator::with_responses([
            r#"{"correctness": 0}"#,
            r#"{"correctness": 1}"#,
        ]));
        let service = EvaluationService::new(generator.clone(), Arc::new(MemoryStore::new()));

        let result = service
            .evaluate_answer("alice", &free_response(), &StudentAnswer::Text("water".into()))
            .await
            .unwrap();
        assert_eq!(result.correctness, 0);
        assert!(generator.last_prompt().unwrap().contains("- **Student's Answer:** water"));

        let result = service
            .evaluate_answer(
                "alice",
                &free_response(),
                &StudentAnswer::Text("Water moving across a membrane".into()),
            )
            .await
            .unwrap();
        assert_eq!(result.correctness, 1);
        assert_eq!(generator.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_grade_rejected() {
        let (generator, _, service) = service();
        generator.push_response(r#"{"correctness": 7}"#);

        let err = service
            .evaluate_answer("alice", &free_response(), &StudentAnswer::Text("water".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedModelOutput { .. }));
    }

    #[tokio::test]
    async fn test_assessment_requires_answered_quiz() {
        let (_, store, service) = service();

        let err = service.strength_weakness("alice", 5).await.unwrap_err();
        assert_eq!(err.to_string(), NO_RECENT_QUIZ_MESSAGE);

        store.add_quiz_items("alice", &[multiple_choice("q1")]).await.unwrap();
        let err = service.strength_weakness("alice", 5).await.unwrap_err();
        assert_eq!(err.to_string(), NO_ANSWERS_MESSAGE);
    }

    #[tokio::test]
    async fn test_assessment_scores_latest_answers() {
        let (generator, store, service) = service();
        let questions: Vec<_> = ["q1", "q2", "q3", "q4"].iter().map(|q| multiple_choice(q)).collect();
        store.add_quiz_items("alice", &questions).await.unwrap();

        service.evaluate_answer("alice", &questions[0], &StudentAnswer::Index(1)).await.unwrap();
        service.evaluate_answer("alice", &questions[1], &StudentAnswer::Index(0)).await.unwrap();
        service.evaluate_answer("alice", &questions[2], &StudentAnswer::Index(1)).await.unwrap();

        let assessment = service.strength_weakness("alice", 3).await.unwrap();
        assert_eq!(assessment.score, 67);
        assert!(!assessment.strength.is_empty());

        let prompt = generator.last_prompt().unwrap();
        assert_eq!(prompt.matches("Correctness: ").count(), 3);
        assert!(!prompt.contains("Question: q4"));
    }

    #[tokio::test]
    async fn test_assessment_ignores_answers_outside_window() {
        let generator = Arc::new(MockGenerator::new());
        let store = Arc::new(History {
            inner: MemoryStore::new(),
            items: vec![
                answered("recent right", 1, 1),
                answered("stale wrong", 0, 30),
                answered("older wrong", 0, 90),
            ],
        });
        let service = EvaluationService::new(generator.clone(), store);

        let assessment = service.strength_weakness("alice", 5).await.unwrap();
        assert_eq!(assessment.score, 100);

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains("Question: recent right"));
        assert!(!prompt.contains("stale wrong"));
        assert!(!prompt.contains("older wrong"));

        let err = service.strength_weakness("bob", 5).await.unwrap_err();
        assert_eq!(err.to_string(), NO_RECENT_QUIZ_MESSAGE);
    }
}
