use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AppState, CanonicalDataset, UploadReport, UploadedFile};
use crate::routes::require_view;
use crate::session::View;
use crate::types::{AppError, AppResult};
use crate::views::{compare, DatasetComparison};

/// Files accepted in one multipart batch before the body limit applies.
const MAX_BATCH_FILES: usize = 8;

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .ingest
        .max_upload_bytes
        .saturating_mul(MAX_BATCH_FILES);

    Router::new()
        .route(
            "/api/sessions/{id}/datasets",
            get(list_datasets)
                .post(upload_datasets)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/sessions/{id}/datasets/compare", get(compare_datasets))
        .with_state(state)
}

async fn read_files(mut multipart: Multipart) -> AppResult<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Error parsing multipart field: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            warn!(field = ?field.name(), "Skipping non-file field");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Failed to read {}: {}", file_name, e)))?;

        let mut file = UploadedFile::new(file_name, data.to_vec());
        if let Some(content_type) = content_type {
            file = file.with_content_type(content_type);
        }
        files.push(file);
    }
    Ok(files)
}

async fn upload_datasets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<UploadReport>> {
    let session = state.sessions.get(id).await?;
    let files = read_files(multipart).await?;
    if files.is_empty() {
        return Err(AppError::InvalidRequest("no files in upload".to_string()));
    }
    info!(session = %id, files = files.len(), "Upload batch received");

    let report = session.lock().await.upload(&files)?;
    Ok(Json(report))
}

async fn list_datasets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CanonicalDataset>>> {
    let session = state.sessions.get(id).await?;
    let datasets = session.lock().await.registry().iter().cloned().collect();
    Ok(Json(datasets))
}

async fn compare_datasets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DatasetComparison>> {
    let session = state.sessions.get(id).await?;
    let session = session.lock().await;
    require_view(session.view(), View::MultipleCsvs)?;
    Ok(Json(compare(session.registry())))
}
