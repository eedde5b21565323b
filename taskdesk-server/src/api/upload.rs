//! Task file upload endpoint
//!
//! Reads the multipart field `file` and hands it to the
//! [`UploadOrchestrator`](crate::ingest::UploadOrchestrator). A request that is
//! not multipart at all, or has no `file` field, is answered `No file uploaded`.

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        DefaultBodyLimit, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use taskdesk_common::api::MessageResponse;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::ingest::IncomingFile;
use crate::AppState;

/// Multipart field carrying the task file
pub const FILE_FIELD: &str = "file";

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(format!("Malformed upload: {}", err.body_text()))
    }
}

/// First `file` field of the form, if any
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Option<IncomingFile>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        debug!(file = %file_name, content_type = ?content_type, bytes = bytes.len(), "Upload received");
        return Ok(Some(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}

/// POST /api/upload
pub async fn upload_tasks(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let incoming = match multipart {
        Ok(mut multipart) => read_file_field(&mut multipart).await?,
        Err(rejection) => {
            debug!(reason = %rejection, "Upload request is not multipart");
            None
        }
    };

    state.uploads.run(incoming).await?;

    Ok(Json(MessageResponse::new("Tasks distributed successfully")))
}

/// Upload route with its request body limit
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_tasks))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
