//! Preview processes: one managed dev server (or shell) per repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::liveness;

/// Output kept per process; older output is dropped first.
pub const OUTPUT_CAP: usize = 512 * 1024;
const RESTART_GRACE: Duration = Duration::from_secs(1);

/// Append-only text buffer with a byte cap. `offset` counts every byte ever
/// written so pollers can ask for "everything after N".
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: String,
    dropped: usize,
}

impl OutputBuffer {
    pub fn push(&mut self, s: &str) {
        self.text.push_str(s);
        if self.text.len() > OUTPUT_CAP {
            let mut cut = self.text.len() - OUTPUT_CAP;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
            self.dropped += cut;
        }
    }

    pub fn offset(&self) -> usize {
        self.dropped + self.text.len()
    }

    /// Text written after absolute offset `since`, or everything retained.
    pub fn since(&self, since: usize) -> &str {
        let start = since.saturating_sub(self.dropped).min(self.text.len());
        let mut start = start;
        while !self.text.is_char_boundary(start) {
            start += 1;
        }
        &self.text[start..]
    }
}

type SharedOutput = Arc<Mutex<OutputBuffer>>;

fn append(out: &SharedOutput, s: &str) {
    if let Ok(mut b) = out.lock() {
        b.push(s);
    }
}

/// Decodes a byte stream read in arbitrary chunks, holding back a trailing
/// partial UTF-8 sequence until the next chunk completes it.
#[derive(Debug, Default)]
struct Utf8Stream {
    pending: Vec<u8>,
}

impl Utf8Stream {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            let err = match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => e,
            };
            let valid = err.valid_up_to();
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
            match err.error_len() {
                Some(bad) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + bad);
                }
                None => {
                    self.pending.drain(..valid);
                    return out;
                }
            }
        }
    }

    /// Whatever is still held back once the stream has ended.
    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

struct Managed {
    pid: u32,
    started_at: DateTime<Utc>,
    command: String,
    stdin: mpsc::UnboundedSender<String>,
    exited: Arc<AtomicBool>,
}

impl Managed {
    fn alive(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    /// `<shell> -l -c <dev command>`
    DevServer,
    /// Interactive login shell.
    Shell,
}

#[derive(Debug, Clone, Serialize)]
pub struct Started {
    pub pid: u32,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Logs {
    pub output: String,
    /// Pass back as `since` to receive only newer output.
    pub offset: usize,
    pub running: bool,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stopped {
    Managed,
    External { pid: u32 },
}

/// Registry of managed processes keyed by repository name. Output of the
/// last process of each repository outlives it so logs stay readable.
#[derive(Clone, Default)]
pub struct ProcessManager {
    running: Arc<Mutex<HashMap<String, Managed>>>,
    last_output: Arc<Mutex<HashMap<String, SharedOutput>>>,
    /// Overrides `$SHELL`.
    shell: Option<PathBuf>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: Some(shell.into()),
            ..Self::default()
        }
    }

    /// Managed process for `repo`, pruning it if it has exited.
    pub fn managed(&self, repo: &str) -> Option<ManagedInfo> {
        let mut running = self.running.lock().ok()?;
        match running.get(repo) {
            Some(m) if m.alive() => Some(ManagedInfo {
                pid: m.pid,
                started_at: m.started_at,
                command: m.command.clone(),
            }),
            Some(_) => {
                running.remove(repo);
                None
            }
            None => None,
        }
    }

    pub fn spawn(
        &self,
        repo: &str,
        dir: &Path,
        kind: LaunchKind,
        dev_command: &str,
    ) -> anyhow::Result<Started> {
        // Held until the new process is registered so two starts for the
        // same repository cannot both pass the check.
        let mut running = self
            .running
            .lock()
            .map_err(|_| anyhow::anyhow!("process registry poisoned"))?;
        if running.get(repo).is_some_and(Managed::alive) {
            anyhow::bail!("Already running (managed)");
        }

        let shell = self.shell.clone().unwrap_or_else(login_shell);
        let mut cmd = Command::new(&shell);
        let command = match kind {
            LaunchKind::DevServer => {
                cmd.arg("-l").arg("-c").arg(dev_command);
                dev_command.to_string()
            }
            LaunchKind::Shell => {
                cmd.arg("-l");
                "shell".to_string()
            }
        };
        cmd.current_dir(dir)
            .env("TERM", "xterm-256color")
            .env("FORCE_COLOR", "1")
            .env("BROWSER", "none")
            .env("CI", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            anyhow::anyhow!(
                "Failed to spawn process: {e} (cwd: {}, cmd: {})",
                dir.display(),
                shell.display()
            )
        })?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow::anyhow!("Failed to start process (no PID)"))?;

        let output: SharedOutput = Arc::default();
        let title = match kind {
            LaunchKind::DevServer => "Starting App",
            LaunchKind::Shell => "Terminal",
        };
        append(&output, &banner(title, repo, dir, &shell, &command));

        let exited = Arc::new(AtomicBool::new(false));
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        pump(child, Arc::clone(&output), Arc::clone(&exited), stdin_rx);

        tracing::info!(%repo, pid, %command, "started managed process");
        let managed = Managed {
            pid,
            started_at: Utc::now(),
            command: command.clone(),
            stdin: stdin_tx,
            exited,
        };
        running.insert(repo.to_string(), managed);
        drop(running);
        if let Ok(mut last) = self.last_output.lock() {
            last.insert(repo.to_string(), output);
        }
        Ok(Started { pid, command })
    }

    /// SIGTERM the managed process, or whatever listens on the dev port of
    /// `url` when nothing is managed.
    pub async fn stop(&self, repo: &str, url: Option<&str>) -> anyhow::Result<Stopped> {
        let managed = self.running.lock().ok().and_then(|mut r| r.remove(repo));
        if let Some(m) = managed {
            if m.alive() {
                terminate(m.pid)?;
            }
            tracing::info!(%repo, pid = m.pid, "stopped managed process");
            return Ok(Stopped::Managed);
        }

        if let Some(port) = url.and_then(liveness::dev_port) {
            if let Some(pid) = liveness::pid_on_port(port).await {
                terminate(pid)?;
                tracing::info!(%repo, pid, port, "stopped external process");
                return Ok(Stopped::External { pid });
            }
        }
        anyhow::bail!("No running process found")
    }

    pub async fn restart(
        &self,
        repo: &str,
        dir: &Path,
        dev_command: &str,
        url: Option<&str>,
    ) -> anyhow::Result<Started> {
        if self.stop(repo, url).await.is_ok() {
            tokio::time::sleep(RESTART_GRACE).await;
        }
        self.spawn(repo, dir, LaunchKind::DevServer, dev_command)
    }

    pub fn logs(&self, repo: &str, since: usize) -> Logs {
        let info = self.managed(repo);
        let output = self
            .last_output
            .lock()
            .ok()
            .and_then(|m| m.get(repo).cloned());
        let (text, offset) = match output.as_ref().and_then(|o| o.lock().ok()) {
            Some(buf) => (buf.since(since).to_string(), buf.offset()),
            None => (String::new(), 0),
        };
        Logs {
            output: text,
            offset,
            running: info.is_some(),
            pid: info.map(|i| i.pid),
        }
    }

    /// Write `data` to the managed process's stdin.
    pub fn send_input(&self, repo: &str, data: &str) -> anyhow::Result<()> {
        let running = self
            .running
            .lock()
            .map_err(|_| anyhow::anyhow!("process registry poisoned"))?;
        let m = running
            .get(repo)
            .filter(|m| m.alive())
            .ok_or_else(|| anyhow::anyhow!("Process input not available"))?;
        m.stdin
            .send(data.to_string())
            .map_err(|_| anyhow::anyhow!("Process input not available"))
    }
}

fn login_shell() -> PathBuf {
    std::env::var_os("SHELL")
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from("/bin/sh"))
}

fn banner(title: &str, repo: &str, dir: &Path, shell: &Path, command: &str) -> String {
    format!(
        "\x1b[36m━━━ {title}: {repo} ━━━\x1b[0m\n\x1b[90m  Cwd:     {}\x1b[0m\n\x1b[90m  Command: {} {command}\x1b[0m\n\x1b[36m━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\x1b[0m\n\n",
        dir.display(),
        shell.display()
    )
}

/// Background tasks: copy stdout/stderr into `output`, forward stdin lines,
/// and record the exit line.
fn pump(
    mut child: Child,
    output: SharedOutput,
    exited: Arc<AtomicBool>,
    mut stdin_rx: mpsc::UnboundedReceiver<String>,
) {
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            while let Some(data) = stdin_rx.recv().await {
                if stdin.write_all(data.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdin.flush().await;
            }
        });
    }

    let stdout_task = child.stdout.take().map(|mut stdout| {
        let out = Arc::clone(&output);
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let mut text = Utf8Stream::default();
            while let Ok(n) = stdout.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                append(&out, &text.decode(&buf[..n]));
            }
            append(&out, &text.finish());
        })
    });
    let stderr_task = child.stderr.take().map(|mut stderr| {
        let out = Arc::clone(&output);
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let mut text = Utf8Stream::default();
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                let chunk = text.decode(&buf[..n]);
                if !chunk.is_empty() {
                    append(&out, &format!("\x1b[31m{chunk}\x1b[m"));
                }
            }
            let rest = text.finish();
            if !rest.is_empty() {
                append(&out, &format!("\x1b[31m{rest}\x1b[m"));
            }
        })
    });

    // The waiter owns the child; stop() signals by PID.
    tokio::spawn(async move {
        let status = child.wait().await;
        if let Some(t) = stdout_task {
            let _ = t.await;
        }
        if let Some(t) = stderr_task {
            let _ = t.await;
        }
        let (code, signal) = match &status {
            Ok(s) => (s.code(), exit_signal(s)),
            Err(_) => (None, None),
        };
        let show = |v: Option<i32>| v.map(|v| v.to_string()).unwrap_or_else(|| "unknown".into());
        append(
            &output,
            &format!("\n[Process exited] code={} signal={}\n", show(code), show(signal)),
        );
        exited.store(true, Ordering::SeqCst);
    });
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn terminate(pid: u32) -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let raw = i32::try_from(pid)?;
    kill(Pid::from_raw(raw), Signal::SIGTERM)?;
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> anyhow::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .status()?;
    anyhow::ensure!(status.success(), "taskkill failed for {pid}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
