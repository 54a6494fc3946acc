//! Answer evaluation handlers

use crate::services::Assessment;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use studyowl_common::{
    auth::AuthContext,
    errors::Result,
    quiz::{Correctness, QuizQuestion, StudentAnswer},
};
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct EvaluateAnswerRequest {
    pub question_and_answer: QuizQuestion,
    pub student_answer: StudentAnswer,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StrengthWeaknessRequest {
    #[validate(range(min = 1, max = 50))]
    pub num_of_qns: u32,
}

/// Grade one answer and record it
pub async fn evaluate_student_answer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<EvaluateAnswerRequest>,
) -> Result<Json<Correctness>> {
    let correctness = state
        .evaluation
        .evaluate_answer(&auth.user_id, &request.question_and_answer, &request.student_answer)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        correctness = correctness.correctness,
        "Answer evaluated"
    );
    Ok(Json(correctness))
}

/// Score the latest answers and assess strengths and weaknesses
pub async fn get_student_strength_weakness(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<StrengthWeaknessRequest>,
) -> Result<Json<Assessment>> {
    request.validate()?;

    let assessment = state
        .evaluation
        .strength_weakness(&auth.user_id, request.num_of_qns)
        .await?;
    Ok(Json(assessment))
}
