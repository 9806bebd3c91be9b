//! The `agent-browser` CLI: locating it, describing command outcomes and
//! replaying a test's steps.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{AgelumError, Result};
use crate::settings::UserSettings;
use crate::testing::scenario::{browser_args, TestStep};
use crate::testing::store as test_store;

pub const BROWSER_BIN: &str = "agent-browser";

/// Checked after PATH, for installs a GUI-launched server does not see.
const FALLBACK_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];
const HOME_FALLBACK_DIRS: &[&str] = &[".local/bin", ".bun/bin"];

/// Resolve the binary from settings, PATH, then well-known install dirs.
pub fn resolve(settings: &UserSettings) -> Result<PathBuf> {
    resolve_with(
        settings.agent_browser_path.as_deref(),
        which::which(BROWSER_BIN).ok(),
        home::home_dir().as_deref(),
    )
}

pub fn resolve_with(
    configured: Option<&Path>,
    on_path: Option<PathBuf>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(p) = configured.filter(|p| p.is_file()) {
        return Ok(p.to_path_buf());
    }
    if let Some(p) = on_path {
        return Ok(p);
    }
    let home_dirs = home
        .into_iter()
        .flat_map(|h| HOME_FALLBACK_DIRS.iter().map(move |d| h.join(d)));
    let fixed = FALLBACK_DIRS.iter().map(PathBuf::from);
    home_dirs
        .chain(fixed)
        .map(|d| d.join(BROWSER_BIN))
        .find(|p| p.is_file())
        .ok_or(AgelumError::BrowserToolMissing)
}

/// Result of one `agent-browser` invocation as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: i32,
}

impl CommandOutcome {
    /// `code` is `None` when the process died from a signal.
    pub fn from_exit(code: Option<i32>, stdout: String, stderr: String) -> Self {
        let exit_code = code.unwrap_or(-1);
        let success = exit_code == 0;
        Self {
            success,
            output: stdout,
            error: (!success).then_some(stderr),
            exit_code,
        }
    }

    pub fn timed_out(output: String, secs: u64) -> Self {
        Self {
            success: false,
            output,
            error: Some(format!("Command timed out after {secs} seconds")),
            exit_code: -1,
        }
    }

    pub fn spawn_failed(err: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(err.to_string()),
            exit_code: -1,
        }
    }
}

/// Run one command to completion, capturing its output.
pub fn execute(exe: &Path, args: &[String]) -> CommandOutcome {
    tracing::debug!(exe = %exe.display(), ?args, "running agent-browser");
    match Command::new(exe).args(args).stdin(Stdio::null()).output() {
        Ok(out) => CommandOutcome::from_exit(
            out.status.code(),
            String::from_utf8_lossy(&out.stdout).into_owned(),
            String::from_utf8_lossy(&out.stderr).into_owned(),
        ),
        Err(e) => CommandOutcome::spawn_failed(e),
    }
}

/// Run with the terminal attached and return the exit code.
pub fn passthrough(exe: &Path, args: &[String]) -> Result<i32> {
    let status = Command::new(exe).args(args).status()?;
    Ok(status.code().unwrap_or(-1))
}

/// A step as it will be replayed. `args` is `None` for steps that need a
/// model and are skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub index: usize,
    pub action: &'static str,
    pub name: Option<String>,
    pub args: Option<Vec<String>>,
}

pub fn plan(steps: &[TestStep]) -> Vec<PlannedStep> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| PlannedStep {
            index,
            action: step.action.name(),
            name: step.meta.name.clone(),
            args: browser_args(step),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateSummary {
    pub executed: usize,
    pub skipped: usize,
    /// Index of the step that failed; replay stops there.
    pub failed_at: Option<usize>,
}

/// Replay the stored steps of `test_id` through `exe`, stopping at the first
/// failing command. `on_step` sees each step with its outcome (`None` when
/// skipped).
pub fn navigate(
    exe: &Path,
    root: &Path,
    test_id: &str,
    mut on_step: impl FnMut(&PlannedStep, Option<&CommandOutcome>),
) -> Result<NavigateSummary> {
    let steps = test_store::steps(root, test_id)?;
    let mut summary = NavigateSummary::default();
    for planned in plan(&steps) {
        let Some(args) = &planned.args else {
            tracing::info!(index = planned.index, action = planned.action, "skipping step without command");
            summary.skipped += 1;
            on_step(&planned, None);
            continue;
        };
        let outcome = execute(exe, args);
        summary.executed += 1;
        on_step(&planned, Some(&outcome));
        if !outcome.success {
            summary.failed_at = Some(planned.index);
            break;
        }
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
