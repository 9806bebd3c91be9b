use agelum_core::browser::{self, CommandOutcome};
use axum::extract::State;
use axum::Json;
use base64::Engine as _;
use record_ai::process::run_captured;
use record_ai::{RecommendationInput, RecordError, Recorder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::error::AppError;
use crate::state::AppState;

const BROWSER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendBody {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub deterministic: bool,
    #[serde(default)]
    pub backend: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureBody {
    #[serde(default)]
    pub repo: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Working directory for browser and model calls: the named project, the
/// default root, or the server's cwd.
fn work_dir(app: &AppState, repo: Option<&str>) -> Result<PathBuf, AppError> {
    match app.repo_root(repo) {
        Ok(root) => Ok(root),
        Err(_) if repo.is_none() => Ok(std::env::current_dir()?),
        Err(e) => Err(e),
    }
}

/// Run `agent-browser` with a 30s timeout, folding every failure into the
/// outcome.
async fn run_browser(exe: &Path, dir: &Path, args: &[String]) -> CommandOutcome {
    let mut cmd = Command::new(exe);
    cmd.args(args).current_dir(dir);
    match run_captured(cmd, None, BROWSER_TIMEOUT).await {
        Ok(out) => CommandOutcome::from_exit(out.code, out.stdout, out.stderr),
        Err(RecordError::Timeout { secs, .. }) => CommandOutcome::timed_out(String::new(), secs),
        Err(e) => CommandOutcome::spawn_failed(e),
    }
}

/// POST /api/tests/record/execute: run one `agent-browser` command.
pub async fn execute(
    State(app): State<AppState>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<CommandOutcome>, AppError> {
    if body.command.trim().is_empty() {
        return Err(AppError::bad_request("Command is required"));
    }
    let settings = app.load_settings()?;
    let exe = browser::resolve(&settings)?;
    let dir = work_dir(&app, body.repo.as_deref())?;

    let mut args = vec![body.command.trim().to_string()];
    args.extend(body.args);
    tracing::info!(exe = %exe.display(), ?args, "recorder command");
    Ok(Json(run_browser(&exe, &dir, &args).await))
}

/// POST /api/tests/record/ai: turn an instruction into the next step.
pub async fn recommend(
    State(app): State<AppState>,
    Json(body): Json<RecommendBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let prompt = non_empty(body.prompt).ok_or_else(|| AppError::bad_request("Prompt required"))?;
    let backend =
        non_empty(body.backend).ok_or_else(|| AppError::bad_request("Backend required"))?;
    let snapshot = non_empty(body.snapshot);
    if body.deterministic && snapshot.is_none() {
        return Err(AppError::bad_request("Snapshot required"));
    }

    let settings = app.load_settings()?;
    let dir = work_dir(&app, body.repo.as_deref())?;
    let mut recorder = Recorder::new(dir, Some(settings.google_api_key));
    if let Some(url) = &app.google_base_url {
        recorder = recorder.with_base_url(url.clone());
    }

    let input = RecommendationInput {
        snapshot: snapshot.unwrap_or_default(),
        prompt,
        screenshot: non_empty(body.screenshot),
        deterministic: body.deterministic,
        backend,
    };
    let recommendation = recorder.recommend(&input).await?;
    Ok(Json(serde_json::to_value(recommendation)?))
}

/// GET /api/tests/record/backends: backends usable right now.
pub async fn backends(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let settings = app.load_settings()?;
    let dir = work_dir(&app, None)?;
    let recorder = Recorder::new(dir, Some(settings.google_api_key));
    Ok(Json(serde_json::to_value(recorder.backends())?))
}

/// POST /api/tests/record/capture: current page as a base64 PNG plus the
/// accessibility snapshot.
pub async fn capture(
    State(app): State<AppState>,
    body: Option<Json<CaptureBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = body.and_then(|Json(b)| b.repo);
    let settings = app.load_settings()?;
    let exe = browser::resolve(&settings)?;
    let dir = work_dir(&app, repo.as_deref())?;

    let shot_path = std::env::temp_dir().join(format!(
        "agelum-record-{}.png",
        chrono::Utc::now().timestamp_millis()
    ));
    let shot_args = vec!["screenshot".to_string(), shot_path.display().to_string()];
    let snap_args = vec!["snapshot".to_string()];
    let (shot, snap) = tokio::join!(
        run_browser(&exe, &dir, &shot_args),
        run_browser(&exe, &dir, &snap_args),
    );

    let screenshot = match tokio::fs::read(&shot_path).await {
        Ok(bytes) if shot.success => {
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
        _ => {
            tracing::warn!(code = shot.exit_code, "screenshot capture failed");
            String::new()
        }
    };
    let _ = tokio::fs::remove_file(&shot_path).await;

    let snapshot = if snap.success {
        snap.output.clone()
    } else {
        tracing::warn!(code = snap.exit_code, "snapshot capture failed");
        String::new()
    };

    Ok(Json(serde_json::json!({
        "screenshot": screenshot,
        "snapshot": snapshot,
        "screenshotError": if shot.success { None } else { shot.error },
        "snapshotError": if snap.success { None } else { snap.error },
    })))
}
