//! Query bot handler

use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use studyowl_common::{auth::AuthContext, errors::Result};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000, message = "Query must be 1-2000 characters"))]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

/// Answer a question from the user's notes
pub async fn query_bot(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate()?;

    let answer = state.query.answer(&auth.user_id, request.query.trim()).await?;
    Ok(Json(QueryResponse { answer }))
}
