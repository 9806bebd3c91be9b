//! The local `gemini` CLI, driven through stdin.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::process::run_captured;
use crate::prompt::{cli_command_prompt, cli_execute_prompt, parse_recommendation};
use crate::types::Recommendation;
use crate::Result;

pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
pub const EXECUTE_TIMEOUT: Duration = Duration::from_secs(120);

/// Files the CLI is pointed at instead of receiving them inline.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub skill: PathBuf,
    pub snapshot: PathBuf,
}

impl Workspace {
    /// `.agelum/ai/skills/agent-browser.md` and `.agelum/temp/snapshot.txt`
    /// under `root`.
    pub fn under(root: &Path) -> Self {
        let agelum = root.join(".agelum");
        Self {
            skill: agelum.join("ai").join("skills").join("agent-browser.md"),
            snapshot: agelum.join("temp").join("snapshot.txt"),
        }
    }

    async fn write_snapshot(&self, snapshot: &str) -> Result<()> {
        if let Some(dir) = self.snapshot.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.snapshot, snapshot).await?;
        Ok(())
    }
}

fn command(exe: &Path, json_output: bool) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("-p").arg("");
    if json_output {
        cmd.arg("-o").arg("json");
    }
    cmd
}

/// Ask the CLI for a single command that performs `prompt`.
pub async fn recommend_command(
    exe: &Path,
    ws: &Workspace,
    snapshot: &str,
    prompt: &str,
) -> Result<Recommendation> {
    ws.write_snapshot(snapshot).await?;
    let input = cli_command_prompt(&ws.skill, &ws.snapshot, prompt);
    debug!(exe = %exe.display(), "asking gemini cli for a command");

    let out = run_captured(command(exe, true), Some(&input), COMMAND_TIMEOUT).await?;
    if !out.success() {
        return Err(out.exit_error("Gemini CLI"));
    }
    parse_recommendation(&out.stdout)
}

/// Let the CLI carry out `prompt` itself; the recorded step replays the
/// instruction.
pub async fn execute_instruction(
    exe: &Path,
    ws: &Workspace,
    snapshot: &str,
    prompt: &str,
) -> Result<Recommendation> {
    ws.write_snapshot(snapshot).await?;
    let input = cli_execute_prompt(&ws.skill, &ws.snapshot, prompt);
    debug!(exe = %exe.display(), "handing instruction to gemini cli");

    let out = run_captured(command(exe, false), Some(&input), EXECUTE_TIMEOUT).await?;
    if !out.success() {
        warn!(code = ?out.code, "gemini cli execution failed");
        return Err(out.exit_error("Gemini CLI"));
    }
    Ok(Recommendation::replay(prompt))
}
