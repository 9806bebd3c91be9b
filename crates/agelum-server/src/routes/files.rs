use agelum_core::document;
use agelum_core::AgelumError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::RepoQuery;
use crate::error::AppError;
use crate::state::{AppState, Topic};

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteFileBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFileBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub repo: Option<String>,
    /// Subdirectory of `.agelum`, e.g. `doc/docs`.
    #[serde(default)]
    pub sub: Option<String>,
}

fn require_path(path: &str) -> Result<(), AppError> {
    if path.trim().is_empty() {
        return Err(AppError::bad_request("path is required"));
    }
    Ok(())
}

/// GET /api/file?repo&path: read a markdown file inside the project.
pub async fn read_file(
    State(app): State<AppState>,
    Query(q): Query<FileQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_path(&q.path)?;
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let content = document::read(&root, &q.path)?;
        Ok::<_, AgelumError>(serde_json::json!({
            "path": q.path,
            "content": content,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// PUT /api/file: write a file, creating parent directories.
pub async fn write_file(
    State(app): State<AppState>,
    Json(body): Json<WriteFileBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_path(&body.path)?;
    let root = app.repo_root(body.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let path = document::write(&root, &body.path, &body.content)?;
        Ok::<_, AgelumError>(serde_json::json!({ "path": path }))
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Files);
    Ok(Json(result))
}

/// DELETE /api/file?repo&path
pub async fn delete_file(
    State(app): State<AppState>,
    Query(q): Query<FileQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_path(&q.path)?;
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        document::delete(&root, &q.path)?;
        Ok::<_, AgelumError>(serde_json::json!({ "deleted": q.path }))
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Files);
    Ok(Json(result))
}

/// POST /api/file/rename: move a file within the project.
pub async fn rename_file(
    State(app): State<AppState>,
    Json(body): Json<RenameFileBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_path(&body.from)?;
    require_path(&body.to)?;
    let root = app.repo_root(body.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let path = document::rename(&root, &body.from, &body.to)?;
        Ok::<_, AgelumError>(serde_json::json!({ "path": path }))
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Files);
    Ok(Json(result))
}

/// GET /api/files?repo&sub: markdown tree under `.agelum`.
pub async fn file_tree(
    State(app): State<AppState>,
    Query(q): Query<TreeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let tree = document::tree(&root, q.sub.as_deref())?;
        Ok::<_, AgelumError>(serde_json::to_value(tree)?)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/docs?repo: documents and plans.
pub async fn list_docs(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let docs = document::list_docs(&root)?;
        Ok::<_, AgelumError>(serde_json::json!({ "docs": docs }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
