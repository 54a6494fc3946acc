//! Notes upload handler

use crate::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use studyowl_common::{
    auth::AuthContext,
    customisation::NotesCustomisationRequest,
    errors::{AppError, Result},
};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub summarised_notes: String,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            message: err.body_text(),
        }
    } else {
        AppError::InvalidFormat {
            message: err.body_text(),
        }
    }
}

/// Generate, store and return notes for an uploaded file
///
/// Multipart fields: `file` (the upload) and `notes_customisation` (JSON text).
pub async fn get_notes_from_uploaded_file(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<NotesResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut customisation = NotesCustomisationRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("notes_customisation") => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    customisation = serde_json::from_str(&text).map_err(|e| AppError::Validation {
                        message: format!("Invalid notes_customisation: {}", e),
                        field: Some("notes_customisation".to_string()),
                    })?;
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;
    if bytes.is_empty() {
        return Err(AppError::validation("Uploaded file is empty"));
    }
    customisation.validate()?;

    tracing::info!(
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        file_name = %file_name,
        "Notes requested"
    );

    state.store.ensure_user(&auth.user_id, &auth.email).await?;
    let summarised_notes = state
        .notes
        .generate_and_store(&auth.user_id, &file_name, bytes, &customisation.resolve())
        .await?;

    Ok(Json(NotesResponse { summarised_notes }))
}
