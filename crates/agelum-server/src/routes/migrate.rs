use agelum_core::AgelumError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::{AppState, Topic};

#[derive(Debug, Deserialize)]
pub struct MigrateBody {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/migrate: move legacy `agelum/` content into `.agelum/`.
pub async fn migrate(
    State(app): State<AppState>,
    Json(body): Json<MigrateBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let dry_run = body.dry_run;
    let report = tokio::task::spawn_blocking(move || {
        let report = agelum_core::migrate::migrate(&root, dry_run)?;
        Ok::<_, AgelumError>(serde_json::to_value(report)?)
    })
    .await
    .map_err(AppError::join)??;

    if !dry_run {
        app.notify(Topic::All);
    }
    Ok(Json(report))
}
