use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::models::{AiVisualizationRequest, AppState, QueryResponse};
use crate::routes::{agent_factory, chat::to_response, require_view};
use crate::session::View;
use crate::types::{AppError, AppResult};
use crate::views::{
    ai_visualization_question, render_plot, to_geojson, PlotRequest, VisualizationOptions,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/sessions/{id}/visualization",
            get(visualization_options).post(render_visualization),
        )
        .route("/api/sessions/{id}/visualization/ai", post(ai_visualization))
        .route("/api/sessions/{id}/geo", get(geo_points))
        .with_state(state)
}

async fn visualization_options(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<VisualizationOptions>> {
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    require_view(session.view(), View::Visualization)?;
    let (context, table) = session.selected_table()?;
    Ok(Json(VisualizationOptions::for_table(&context.dataset_name, &table)))
}

async fn render_visualization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PlotRequest>,
) -> AppResult<Response> {
    let session = state.sessions.get(id).await?;
    let (table, output_path) = {
        let mut session = session.lock().await;
        require_view(session.view(), View::Visualization)?;
        let (_, table) = session.selected_table()?;
        let plots = session.workspace_path().join("plots");
        tokio::fs::create_dir_all(&plots).await?;
        (table, plots.join(format!("{}.png", Uuid::new_v4())))
    };

    let plot = request.plot;
    let path = output_path.clone();
    tokio::task::spawn_blocking(move || render_plot(&table, &request, &path))
        .await
        .map_err(|e| AppError::Internal(format!("plot task failed: {}", e)))??;

    let png = tokio::fs::read(&output_path).await?;
    info!(session = %id, plot = ?plot, bytes = png.len(), "Plot rendered");
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn ai_visualization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AiVisualizationRequest>,
) -> AppResult<Json<QueryResponse>> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidRequest("query must not be empty".to_string()));
    }
    let factory = agent_factory(&state)?;
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    require_view(session.view(), View::Visualization)?;

    let answer = session
        .query(&factory, &ai_visualization_question(&request.query))
        .await?;
    Ok(Json(to_response(&session, answer)))
}

async fn geo_points(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let session = state.sessions.get(id).await?;
    let mut session = session.lock().await;
    require_view(session.view(), View::GeospatialMap)?;
    let (context, table) = session.selected_table()?;
    Ok(Json(to_geojson(&context.dataset_name, &table)?))
}
