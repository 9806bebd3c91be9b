use agelum_core::settings::ProjectKind;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::path::PathBuf;

use super::RepoQuery;
use crate::error::AppError;
use crate::state::{AppState, Topic};

/// GET /api/repositories: configured projects plus folder children.
pub async fn list_repositories(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let settings = app.settings.clone();
    let result = tokio::task::spawn_blocking(move || {
        let repos = settings.list_repositories()?;
        let list: Vec<serde_json::Value> = repos
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.name,
                    "path": p.path,
                    "type": p.kind,
                    "url": p.url,
                    "workflow_id": p.workflow_id,
                })
            })
            .collect();
        Ok::<_, agelum_core::AgelumError>(serde_json::json!({ "repositories": list }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AddRepositoryBody {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ProjectKind,
}

/// POST /api/repositories: register a project or folder.
pub async fn add_repository(
    State(app): State<AppState>,
    Json(body): Json<AddRepositoryBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let settings = app.settings.clone();
    let project = tokio::task::spawn_blocking(move || {
        settings.add_project(&body.path, body.name.as_deref(), body.kind)
    })
    .await
    .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(Json(serde_json::json!({ "repository": project })))
}

/// DELETE /api/repositories?repo: forget a project; its files stay.
pub async fn remove_repository(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = q
        .repo
        .ok_or_else(|| AppError::bad_request("Repository is required"))?;
    let settings = app.settings.clone();
    let removed = tokio::task::spawn_blocking(move || settings.remove_project(&name))
        .await
        .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(Json(serde_json::json!({ "removed": removed.id })))
}
