//! Document uploads referenced by `document` answers.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::errors::{AppError, AppResult};

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Value to send as `document_path` in an answer
    #[schema(example = "/uploads/5f0c9e3b.pdf")]
    pub path: String,
    pub size: usize,
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/", post(upload_document))
}

/// Store a document (multipart field `file`)
#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "Uploads",
    security(("bearer_auth" = [])),
    request_body(
        content = Vec<u8>,
        content_type = "multipart/form-data",
        description = "Field `file`"
    ),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or disallowed type"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Uploaded file needs a name"))?;
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge(state.storage.max_bytes())
            } else {
                AppError::bad_request(e.body_text())
            }
        })?;

        let stored = state.storage.save(&file_name, &bytes).await?;
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                path: stored.url_path,
                size: stored.size,
            }),
        ));
    }

    Err(AppError::validation("Multipart field 'file' is required"))
}
