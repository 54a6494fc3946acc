//! Quiz handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use studyowl_common::{
    auth::AuthContext,
    customisation::QuizCustomisationRequest,
    errors::Result,
    quiz::{QuizQuestion, StrengthWeakness},
};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub question_answer_list: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateQuizRequest {
    pub quiz_customisation: QuizCustomisationRequest,
    pub strength_and_weakness: StrengthWeakness,
}

/// Generate a quiz from the user's notes
pub async fn get_quiz_from_uploaded_notes(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<QuizCustomisationRequest>,
) -> Result<Json<QuizResponse>> {
    request.validate()?;
    state.store.ensure_user(&auth.user_id, &auth.email).await?;

    let question_answer_list = state.quiz.generate(&auth.user_id, &request).await?;
    Ok(Json(QuizResponse { question_answer_list }))
}

/// Generate a quiz focused on the weaknesses from a previous assessment
pub async fn regenerate_quiz(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<RegenerateQuizRequest>,
) -> Result<Json<QuizResponse>> {
    request.quiz_customisation.validate()?;
    state.store.ensure_user(&auth.user_id, &auth.email).await?;

    let question_answer_list = state
        .quiz
        .regenerate(&auth.user_id, &request.quiz_customisation, &request.strength_and_weakness)
        .await?;
    Ok(Json(QuizResponse { question_answer_list }))
}
