use agelum_core::settings::{self, ProjectOverrides, UserSettings};
use agelum_core::AgelumError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::RepoQuery;
use crate::error::AppError;
use crate::state::{AppState, Topic};

fn wrap(settings: UserSettings) -> Result<Json<Value>, AgelumError> {
    Ok(Json(serde_json::json!({ "settings": settings })))
}

/// GET /api/settings
pub async fn get_settings(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let store = app.settings.clone();
    let body = tokio::task::spawn_blocking(move || wrap(store.load()?))
        .await
        .map_err(AppError::join)??;
    Ok(body)
}

/// POST /api/settings: replace the whole settings document.
pub async fn replace_settings(
    State(app): State<AppState>,
    Json(settings): Json<UserSettings>,
) -> Result<Json<Value>, AppError> {
    let store = app.settings.clone();
    let body = tokio::task::spawn_blocking(move || {
        store.save(&settings)?;
        wrap(store.load()?)
    })
    .await
    .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(body)
}

/// PATCH /api/settings: merge top-level keys, given bare or under `settings`.
pub async fn patch_settings(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let patch = match body {
        Value::Object(mut map) => match map.remove("settings") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                map.insert("settings".to_string(), other);
                map
            }
            None => map,
        },
        _ => return Err(AppError::bad_request("Settings must be a JSON object")),
    };
    let store = app.settings.clone();
    let body = tokio::task::spawn_blocking(move || wrap(store.update(patch)?))
        .await
        .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(body)
}

/// DELETE /api/settings: back to defaults.
pub async fn reset_settings(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let store = app.settings.clone();
    let body = tokio::task::spawn_blocking(move || wrap(store.reset()?))
        .await
        .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(body)
}

/// GET /api/project/config?repo: the project's own `.agelum/config.json`.
pub async fn get_project_config(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let config = tokio::task::spawn_blocking(move || settings::project_overrides(&root))
        .await
        .map_err(AppError::join)??;
    Ok(Json(serde_json::json!({ "config": config })))
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfigBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub config: ProjectOverrides,
}

/// POST /api/project/config {repo, config}
pub async fn save_project_config(
    State(app): State<AppState>,
    Json(body): Json<ProjectConfigBody>,
) -> Result<Json<Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let config = body.config;
    let saved = tokio::task::spawn_blocking(move || {
        settings::write_project_overrides(&root, &config)?;
        Ok::<_, AgelumError>(config)
    })
    .await
    .map_err(AppError::join)??;
    app.notify(Topic::Settings);
    Ok(Json(serde_json::json!({ "config": saved })))
}
