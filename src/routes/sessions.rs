use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, NavigateRequest, SelectRequest, SessionSnapshot, ViewContext};
use crate::profile::DatasetProfile;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/select", post(select_dataset))
        .route("/api/sessions/{id}/navigate", post(navigate))
        .route("/api/sessions/{id}/overview", get(overview))
        .with_state(state)
}

async fn create_session(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SessionSnapshot>)> {
    let id = state.sessions.create().await?;
    let session = state.sessions.get(id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let session = state.sessions.get(id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    session.reset()?;
    Ok(Json(session.snapshot()))
}

async fn select_dataset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> AppResult<Json<SessionSnapshot>> {
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    session.select(&request.name)?;
    info!(session = %id, dataset = %request.name, "Dataset selected");
    Ok(Json(session.snapshot()))
}

async fn navigate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NavigateRequest>,
) -> AppResult<Json<ViewContext>> {
    let session = state.sessions.get(id).await?;
    let context = session.lock().await.navigate(request.view)?;
    Ok(Json(context))
}

async fn overview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DatasetProfile>> {
    let session = state.sessions.get(id).await?;
    let (context, table) = session.lock().await.selected_table()?;
    Ok(Json(DatasetProfile::build(&context.dataset_name, &table)))
}
