use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::agents::QueryAnswer;
use crate::models::{AppState, QueryRequest, QueryResponse};
use crate::routes::agent_factory;
use crate::session::Session;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/query", post(post_query))
        .with_state(state)
}

pub(crate) fn to_response(session: &Session, answer: QueryAnswer) -> QueryResponse {
    QueryResponse {
        dataset: session
            .agent()
            .map(|agent| agent.dataset_name().to_string())
            .unwrap_or_default(),
        text: answer.text,
        artifacts: answer
            .artifacts
            .iter()
            .map(|p| {
                p.strip_prefix(session.workspace_path())
                    .unwrap_or(p)
                    .display()
                    .to_string()
            })
            .collect(),
    }
}

pub async fn post_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> AppResult<Json<QueryResponse>> {
    let factory = agent_factory(&state)?;
    let session = state.sessions.get(id).await?;
    // Held across the LLM call: queries on one session run one at a time
    let mut session = session.lock().await;

    let started = std::time::Instant::now();
    let answer = session.query(&factory, &request.question).await?;
    info!(
        session = %id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Query answered"
    );

    Ok(Json(to_response(&session, answer)))
}
