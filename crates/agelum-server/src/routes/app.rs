use agelum_core::settings::ProjectConfig;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::liveness;
use crate::process::LaunchKind;
use crate::state::{AppState, Topic};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub repo: Option<String>,
    /// Only an answering HTTP request counts as ready.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppActionBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub since: usize,
}

#[derive(Debug, Deserialize)]
pub struct InputBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub data: String,
}

/// Registry key for a project's managed process.
fn process_key(project: &ProjectConfig) -> String {
    if project.id.is_empty() {
        project.name.clone()
    } else {
        project.id.clone()
    }
}

/// GET /api/app-status?repo: is the preview app running, and who owns it.
pub async fn get_status(
    State(app): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let project = app.target_project(q.repo.as_deref())?;
    let managed = app.processes.managed(&process_key(&project));
    let url_ready = match project.url.as_deref() {
        Some(url) => liveness::url_alive(url, q.strict).await,
        None => false,
    };

    let pid = match &managed {
        Some(m) => Some(m.pid),
        None if url_ready => match project.url.as_deref().and_then(liveness::dev_port) {
            Some(port) => liveness::pid_on_port(port).await,
            None => None,
        },
        None => None,
    };

    Ok(Json(serde_json::json!({
        "is_running": managed.is_some() || url_ready,
        "is_managed": managed.is_some(),
        "is_url_ready": url_ready,
        "pid": pid,
        "started_at": managed.as_ref().map(|m| m.started_at),
        "command": managed.as_ref().map(|m| m.command.clone()).unwrap_or_else(|| project.dev_command()),
        "url": project.url,
    })))
}

/// POST /api/app-status: start, stop, restart or open a shell.
pub async fn app_action(
    State(app): State<AppState>,
    Json(body): Json<AppActionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let project = app.target_project(body.repo.as_deref())?;
    let key = process_key(&project);
    let url = project.url.clone();

    let result = match body.action.as_str() {
        "start" => {
            if app.processes.managed(&key).is_some() {
                return Err(AppError::conflict("Already running (managed)"));
            }
            if let Some(u) = url.as_deref() {
                if liveness::url_alive(u, false).await {
                    return Err(AppError::conflict("Already running externally"));
                }
            }
            let started = app.processes.spawn(
                &key,
                &project.path,
                LaunchKind::DevServer,
                &project.dev_command(),
            )?;
            serde_json::json!({ "success": true, "pid": started.pid, "command": started.command })
        }
        "shell" => {
            if app.processes.managed(&key).is_some() {
                return Err(AppError::conflict("Already running (managed)"));
            }
            let started = app
                .processes
                .spawn(&key, &project.path, LaunchKind::Shell, "")?;
            serde_json::json!({ "success": true, "pid": started.pid, "command": started.command })
        }
        "stop" => {
            let stopped = app
                .processes
                .stop(&key, url.as_deref())
                .await
                .map_err(|e| AppError::not_found(e.to_string()))?;
            serde_json::json!({ "success": true, "stopped": stopped })
        }
        "restart" => {
            let started = app
                .processes
                .restart(&key, &project.path, &project.dev_command(), url.as_deref())
                .await?;
            serde_json::json!({ "success": true, "pid": started.pid, "command": started.command })
        }
        other => return Err(AppError::bad_request(format!("Unknown action '{other}'"))),
    };

    app.notify(Topic::App);
    Ok(Json(result))
}

/// GET /api/app-logs?repo&since: output of the managed process from `since`.
pub async fn get_logs(
    State(app): State<AppState>,
    Query(q): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let project = app.target_project(q.repo.as_deref())?;
    let logs = app.processes.logs(&process_key(&project), q.since);
    Ok(Json(serde_json::to_value(logs)?))
}

/// POST /api/app-logs/input: write to the managed process's stdin.
pub async fn send_input(
    State(app): State<AppState>,
    Json(body): Json<InputBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let project = app.target_project(body.repo.as_deref())?;
    app.processes
        .send_input(&process_key(&project), &body.data)
        .map_err(|e| AppError::conflict(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}
