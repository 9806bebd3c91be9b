use agelum_core::annotation::{self, Annotation, Viewport};
use agelum_core::report::{self, ReportRequest};
use agelum_core::AgelumError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::{AppState, Topic};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBody {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(flatten)]
    pub viewport: Viewport,
    #[serde(default)]
    pub image_href: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportBody {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(flatten)]
    pub report: ReportRequest,
}

/// POST /api/annotations/render: SVG overlay and numbered instructions.
pub async fn render(Json(body): Json<RenderBody>) -> Result<Json<serde_json::Value>, AppError> {
    let svg = annotation::render_overlay(&body.annotations, body.viewport, &body.image_href);
    Ok(Json(serde_json::json!({
        "svg": svg,
        "prompts": annotation::prompt_list(&body.annotations),
    })))
}

/// POST /api/reports: store an annotated screenshot as an inbox task.
pub async fn create_report(
    State(app): State<AppState>,
    Json(body): Json<ReportBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let created = report::create_report(&root, &body.report)?;
        tracing::info!(task = %created.task.id, "bug report filed");
        Ok::<_, AgelumError>(serde_json::to_value(created)?)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Items);
    Ok(Json(result))
}
