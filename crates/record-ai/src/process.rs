use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::{RecordError, Result};

/// Collected result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Error describing a non-zero exit, including collected stderr.
    pub fn exit_error(&self, program: &str) -> RecordError {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".into());
        let stderr = self.stderr.trim();
        let msg = if stderr.is_empty() {
            format!("{program} exited with code {code}")
        } else {
            format!("{program} exited with code {code}\nstderr: {stderr}")
        };
        RecordError::Process(msg)
    }
}

/// Run `cmd` to completion, optionally feeding `input` on stdin, and kill it
/// once `timeout` elapses.
///
/// Stderr is drained by a background task so a chatty child never blocks on
/// a full pipe while stdout is being read.
pub async fn run_captured(
    mut cmd: Command,
    input: Option<&str>,
    timeout: Duration,
) -> Result<Captured> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| RecordError::Process(format!("failed to spawn {program}: {e}")))?;

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(text.as_bytes()).await?;
        // Dropping stdin closes the pipe so the child sees EOF.
        drop(stdin);
    }

    let stderr_buf = Arc::new(Mutex::new(String::new()));
    let stderr_task = child.stderr.take().map(|stderr| {
        let buf = Arc::clone(&stderr_buf);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if let Ok(mut b) = buf.lock() {
                    if !b.is_empty() {
                        b.push('\n');
                    }
                    b.push_str(&line);
                }
            }
        })
    });

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| RecordError::Process("stdout not captured".into()))?;

    let work = async {
        let mut out = String::new();
        stdout.read_to_string(&mut out).await?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((out, status))
    };

    let (out, status) = match tokio::time::timeout(timeout, work).await {
        Ok(res) => res?,
        Err(_) => {
            let _ = child.kill().await;
            return Err(RecordError::Timeout {
                program,
                secs: timeout.as_secs(),
            });
        }
    };

    if let Some(task) = stderr_task {
        let _ = task.await;
    }
    let stderr = stderr_buf.lock().map(|b| b.clone()).unwrap_or_default();

    Ok(Captured {
        code: status.code(),
        stdout: out,
        stderr,
    })
}
