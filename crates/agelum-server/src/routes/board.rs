use agelum_core::types::ItemKind;
use agelum_core::AgelumError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// GET /api/board?repo&kind: Kanban columns for tasks (default), epics or ideas.
pub async fn get_board(
    State(app): State<AppState>,
    Query(q): Query<BoardQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let kind: ItemKind = q.kind.as_deref().unwrap_or("task").parse()?;
    let result = tokio::task::spawn_blocking(move || {
        let columns = agelum_core::board::board(&root, kind)?;
        Ok::<_, AgelumError>(serde_json::json!({
            "kind": kind,
            "columns": columns,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
