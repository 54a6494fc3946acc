//! Deletion handlers

use super::auth::MessageResponse;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use studyowl_common::{
    auth::AuthContext,
    errors::Result,
    store::{Collection, MAX_DELETE_BATCH_SIZE},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteMediaRequest {
    /// Resource name in the model's file store, e.g. `files/abc123`
    #[validate(length(min = 1, max = 256))]
    pub file_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteCollectionsRequest {
    #[validate(length(min = 1))]
    pub coll_name: String,
    #[validate(range(max = MAX_DELETE_BATCH_SIZE))]
    pub batch_size: u64,
}

/// Remove an uploaded media file from the model's file store
pub async fn delete_media(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<DeleteMediaRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;

    state.generator.delete_file(&request.file_name).await?;
    tracing::info!(user_id = %auth.user_id, file = %request.file_name, "Media file deleted");

    Ok(Json(MessageResponse {
        message: format!("Media file {} deleted.", request.file_name),
    }))
}

/// Delete one of the caller's collections in batches
pub async fn delete_collections(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<DeleteCollectionsRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;
    let collection: Collection = request.coll_name.parse()?;

    let deleted = state
        .store
        .delete_collection(&auth.user_id, collection, request.batch_size)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        collection = collection.as_str(),
        deleted,
        "Collection deleted"
    );

    Ok(Json(MessageResponse {
        message: format!("Deleted {} documents from {}.", deleted, collection.as_str()),
    }))
}
