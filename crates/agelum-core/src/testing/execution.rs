//! Test executions: running the scenario runner and persisting results to
//! `runs/<test id>/<execution id>/result.json`.

use super::store::{resolve_test_path, test_name};
use crate::error::{AgelumError, Result};
use crate::io::{ensure_dir, write_json};
use crate::naming::now_millis;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;

/// Path fragments after which a screenshot path maps onto the artifact route.
const RUNS_MARKERS: &[&str] = &[".agelum/work/tests/runs/", ".agelum/tests/runs/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Passed,
    Failed,
    Error,
    #[default]
    Unknown,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Passed => "passed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub id: String,
    pub test_id: String,
    pub test_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub screenshot_count: usize,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

/// Body of a `finish` call from an external runner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    #[serde(default)]
    pub execution_id: String,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Structured lines framing a streamed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    ExecStart {
        #[serde(rename = "executionId")]
        execution_id: String,
        #[serde(rename = "testId")]
        test_id: String,
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    ExecComplete {
        #[serde(rename = "executionId")]
        execution_id: String,
        status: ExecutionStatus,
        duration: i64,
    },
}

impl ExecEvent {
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn new_execution_id() -> String {
    format!("exec-{}", now_millis())
}

/// Map a local screenshot path to its `/api/tests/artifacts/…` URL.
pub fn artifact_url(path: &str) -> String {
    if path.starts_with("http") || path.starts_with(paths::ARTIFACTS_ROUTE) {
        return path.to_string();
    }
    for marker in RUNS_MARKERS {
        if let Some((_, rest)) = path.split_once(marker) {
            return format!("{}{rest}", paths::ARTIFACTS_ROUTE);
        }
    }
    path.to_string()
}

/// Resolve an artifact path relative to the runs directory. Only normal
/// components are accepted.
pub fn artifact_path(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    if rel.is_empty() || rel_path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(AgelumError::InvalidPath(rel.to_string()));
    }
    let full = root.join(paths::TEST_RUNS_DIR).join(rel_path);
    if !full.is_file() {
        return Err(AgelumError::FileNotFound(rel.to_string()));
    }
    Ok(full)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn save_result(root: &Path, result: &ExecutionResult) -> Result<PathBuf> {
    let path = paths::execution_dir(root, &result.test_id, &result.id).join("result.json");
    write_json(&path, result)?;
    Ok(path)
}

/// Record a result reported by an external runner.
pub fn finish(root: &Path, test_id: &str, req: FinishRequest) -> Result<ExecutionResult> {
    paths::validate_id(test_id)?;
    paths::validate_id(&req.execution_id)?;
    let started_at = req.started_at.unwrap_or_else(Utc::now);
    let completed_at = req.completed_at.unwrap_or_else(Utc::now);
    let screenshots: Vec<String> = req.screenshots.iter().map(|p| artifact_url(p)).collect();
    let result = ExecutionResult {
        id: req.execution_id,
        test_id: test_id.to_string(),
        test_name: test_name(root, test_id),
        started_at,
        completed_at,
        status: req.status.unwrap_or_default(),
        duration_ms: (completed_at - started_at).num_milliseconds(),
        exit_code: None,
        logs: req.logs,
        screenshot_count: screenshots.len(),
        screenshots,
    };
    save_result(root, &result)?;
    Ok(result)
}

/// Stored results for a test, newest first. Malformed result files are skipped.
pub fn executions(root: &Path, test_id: &str, last: Option<usize>) -> Result<Vec<ExecutionResult>> {
    paths::validate_id(test_id)?;
    let dir = paths::test_runs_dir(root, test_id);
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut results = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file = entry.path().join("result.json");
        let Ok(data) = std::fs::read_to_string(&file) else {
            continue;
        };
        match serde_json::from_str::<ExecutionResult>(&data) {
            Ok(r) => results.push(r),
            Err(e) => tracing::debug!(path = %file.display(), error = %e, "skipping malformed result"),
        }
    }
    results.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    if let Some(n) = last {
        results.truncate(n);
    }
    Ok(results)
}

// ---------------------------------------------------------------------------
// Output collection
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OutputEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    path: Option<String>,
}

/// Accumulates runner output: every non-empty line is a log, and
/// `{"type":"screenshot","path":…}` lines register screenshots.
#[derive(Debug, Default)]
pub struct OutputCollector {
    pub logs: Vec<String>,
    pub screenshots: Vec<String>,
}

impl OutputCollector {
    pub fn push_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.logs.push(line.to_string());
        let trimmed = line.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(ev) = serde_json::from_str::<OutputEvent>(trimmed) {
                if ev.kind == "screenshot" {
                    if let Some(p) = ev.path {
                        self.screenshots.push(p);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Everything known about a run before the runner starts.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub execution_id: String,
    pub test_id: String,
    pub test_name: String,
    pub test_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Resolve the test and create its execution directory.
pub fn prepare(root: &Path, test_id: &str) -> Result<PreparedRun> {
    let test_path = resolve_test_path(root, test_id)?;
    let execution_id = new_execution_id();
    ensure_dir(&paths::execution_dir(root, test_id, &execution_id))?;
    Ok(PreparedRun {
        execution_id,
        test_id: test_id.to_string(),
        test_name: test_name(root, test_id),
        test_path,
        started_at: Utc::now(),
    })
}

/// Split a runner command line (`npx tsx runner.ts`) and append the test path.
pub fn runner_argv(runner: &str, test_path: &Path) -> Vec<String> {
    let mut argv: Vec<String> = runner.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        argv = crate::settings::DEFAULT_TEST_RUNNER
            .split_whitespace()
            .map(str::to_string)
            .collect();
    }
    argv.push(test_path.display().to_string());
    argv
}

/// Run the scenario runner for a prepared execution, passing every streamed
/// line to `emit`: an `exec_start` event, the runner's stdout and stderr,
/// an exit line and a final `exec_complete` event. The result is persisted.
pub fn run(
    root: &Path,
    prepared: &PreparedRun,
    runner: &str,
    mut emit: impl FnMut(&str),
) -> Result<ExecutionResult> {
    emit(
        &ExecEvent::ExecStart {
            execution_id: prepared.execution_id.clone(),
            test_id: prepared.test_id.clone(),
            started_at: prepared.started_at,
        }
        .to_line(),
    );

    let argv = runner_argv(runner, &prepared.test_path);
    let mut collector = OutputCollector::default();
    tracing::info!(test = %prepared.test_id, exec = %prepared.execution_id, cmd = ?argv, "running test");

    let (status, exit_code) = match Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(mut child) => {
            let (tx, rx) = mpsc::channel::<String>();
            let mut readers = Vec::new();
            if let Some(out) = child.stdout.take() {
                readers.push(spawn_reader(out, tx.clone()));
            }
            if let Some(err) = child.stderr.take() {
                readers.push(spawn_reader(err, tx.clone()));
            }
            drop(tx);
            for line in rx {
                emit(&line);
                collector.push_line(&line);
            }
            for r in readers {
                let _ = r.join();
            }
            let exit = child.wait()?;
            let code = exit.code().unwrap_or(-1);
            emit(&format!("Process exited with code {code}"));
            let status = if exit.success() {
                ExecutionStatus::Passed
            } else {
                ExecutionStatus::Failed
            };
            (status, code)
        }
        Err(e) => {
            let line = format!("Error: {e}");
            emit(&line);
            collector.logs.push(line);
            (ExecutionStatus::Error, -1)
        }
    };

    let completed_at = Utc::now();
    let screenshots: Vec<String> = collector.screenshots.iter().map(|p| artifact_url(p)).collect();
    let result = ExecutionResult {
        id: prepared.execution_id.clone(),
        test_id: prepared.test_id.clone(),
        test_name: prepared.test_name.clone(),
        started_at: prepared.started_at,
        completed_at,
        status,
        duration_ms: (completed_at - prepared.started_at).num_milliseconds(),
        exit_code: Some(exit_code),
        logs: collector.logs,
        screenshot_count: screenshots.len(),
        screenshots,
    };
    if let Err(e) = save_result(root, &result) {
        tracing::error!(error = %e, exec = %result.id, "failed to persist execution result");
    }
    emit(
        &ExecEvent::ExecComplete {
            execution_id: result.id.clone(),
            status: result.status,
            duration: result.duration_ms,
        }
        .to_line(),
    );
    Ok(result)
}

fn spawn_reader<R: std::io::Read + Send + 'static>(
    source: R,
    tx: mpsc::Sender<String>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(source).lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
