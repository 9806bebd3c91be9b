use agelum_core::testing::{execution, store};
use agelum_core::testing::{FinishRequest, NewTest, TestStep};
use agelum_core::AgelumError;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::RepoQuery;
use crate::error::AppError;
use crate::state::{AppState, Topic};

#[derive(Debug, Deserialize)]
pub struct CreateTestBody {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(flatten)]
    pub test: NewTest,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTestBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub last: Option<usize>,
}

// ---------------------------------------------------------------------------
// Tests and groups
// ---------------------------------------------------------------------------

/// GET /api/tests?repo: index entries plus flat test files.
pub async fn list_tests(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        Ok::<_, AgelumError>(serde_json::to_value(store::list(&root)?)?)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/tests: create a test in a group.
pub async fn create_test(
    State(app): State<AppState>,
    Json(body): Json<CreateTestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let entry = store::create(&root, body.test)?;
        Ok::<_, AgelumError>(serde_json::to_value(entry)?)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

/// GET /api/tests/groups?repo
pub async fn list_groups(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let groups = store::list_groups(&root)?;
        Ok::<_, AgelumError>(serde_json::json!({ "groups": groups }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/tests/groups: create a group directory.
pub async fn create_group(
    State(app): State<AppState>,
    Json(body): Json<CreateGroupBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let group = store::create_group(&root, &body.name)?;
        Ok::<_, AgelumError>(serde_json::json!({ "group": group }))
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

/// GET /api/tests/:id?repo
pub async fn get_test(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        Ok::<_, AgelumError>(serde_json::to_value(store::get(&root, &id)?)?)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// PUT /api/tests/:id?repo: replace name, steps and description.
pub async fn update_test(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
    Json(body): Json<UpdateTestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let record = store::update(&root, &id, &body.name, body.steps, body.description)?;
        Ok::<_, AgelumError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

/// DELETE /api/tests/:id?repo
pub async fn delete_test(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        store::delete(&root, &id)?;
        Ok::<_, AgelumError>(serde_json::json!({ "deleted": id }))
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// GET /api/tests/:id/steps?repo
pub async fn list_steps(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let steps = store::steps(&root, &id)?;
        Ok::<_, AgelumError>(serde_json::json!({ "steps": steps }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/tests/:id/steps?repo: append a step.
pub async fn add_step(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
    Json(step): Json<TestStep>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let step = store::add_step(&root, &id, step)?;
        Ok::<_, AgelumError>(serde_json::to_value(step)?)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// POST /api/tests/:id/run?repo: run the test, streaming runner output as
/// plain text. The execution id is returned in `X-Execution-Id`.
pub async fn run_test(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
) -> Result<Response, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let runner = app.load_settings()?.test_runner().to_string();

    let prepared = {
        let root = root.clone();
        tokio::task::spawn_blocking(move || execution::prepare(&root, &id))
            .await
            .map_err(AppError::join)??
    };
    let execution_id = prepared.execution_id.clone();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let notifier = app.clone();
    tokio::task::spawn_blocking(move || {
        let outcome = execution::run(&root, &prepared, &runner, |line| {
            let _ = tx.send(format!("{line}\n"));
        });
        if let Err(e) = outcome {
            tracing::error!(error = %e, exec = %prepared.execution_id, "test run failed");
            let _ = tx.send(format!("Error: {e}\n"));
        }
        notifier.notify(Topic::Tests);
    });

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::HeaderName::from_static("x-execution-id"), execution_id),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// POST /api/tests/:id/finish?repo: record a result from an external runner.
pub async fn finish_test(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RepoQuery>,
    Json(req): Json<FinishRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let result = execution::finish(&root, &id, req)?;
        Ok::<_, AgelumError>(serde_json::to_value(result)?)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Tests);
    Ok(Json(result))
}

/// GET /api/tests/:id/executions?repo&last: newest first.
pub async fn list_executions(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ExecutionsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let last = q.last;
    let result = tokio::task::spawn_blocking(move || {
        let executions = execution::executions(&root, &id, last)?;
        Ok::<_, AgelumError>(serde_json::json!({ "executions": executions }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/tests/artifacts/*path?repo: a file written by a run, such as a
/// screenshot.
pub async fn get_artifact(
    State(app): State<AppState>,
    Path(rel): Path<String>,
    Query(q): Query<RepoQuery>,
) -> Result<Response, AppError> {
    let root = app.repo_root(q.repo.as_deref())?;
    let (bytes, mime) = tokio::task::spawn_blocking(move || {
        let path = execution::artifact_path(&root, &rel)?;
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AgelumError::FileNotFound(rel.clone()),
            _ => AgelumError::Io(e),
        })?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        Ok::<_, AgelumError>((bytes, mime))
    })
    .await
    .map_err(AppError::join)??;

    Ok(([(header::CONTENT_TYPE, mime.as_ref().to_string())], bytes).into_response())
}
