//! Account handlers

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use studyowl_common::auth::{AuthContext, Credentials};
use studyowl_common::errors::Result;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// Create an account with the identity provider
pub async fn signup(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    credentials.validate()?;

    let identity = state.identity.sign_up(&credentials.email, &credentials.password).await?;
    state.store.ensure_user(&identity.user_id, &identity.email).await?;

    tracing::info!(user_id = %identity.user_id, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("User {} created successfully", identity.email),
        }),
    ))
}

/// Exchange email and password for an ID token
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
    credentials.validate()?;

    let session = state.identity.sign_in(&credentials.email, &credentials.password).await?;

    tracing::info!(user_id = %session.identity.user_id, "User logged in");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        id_token: session.id_token,
    }))
}

/// Greet the authenticated user
pub async fn welcome(auth: AuthContext) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Welcome {}!", auth.email),
    })
}
