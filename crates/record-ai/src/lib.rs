//! `record-ai` turns a recorder instruction into a browser test step.
//!
//! The recorder hands over the current DOM snapshot (and optionally a
//! screenshot) together with a natural-language instruction. Two outcomes
//! are possible:
//!
//! - **deterministic**: a model translates the instruction into one
//!   `agent-browser` command, which is recorded as a `command` step and
//!   replays without a model.
//! - **non-deterministic**: the local `gemini` CLI carries out the
//!   instruction itself and the recorded step is a `prompt` step holding
//!   the instruction.
//!
//! ```text
//! RecommendationInput ──► Recorder::recommend
//!                            ├─ deterministic + google-api ─► google::recommend (HTTPS)
//!                            ├─ deterministic + gemini-cli ─► gemini_cli::recommend_command
//!                            └─ otherwise ──────────────────► gemini_cli::execute_instruction
//! ```

pub mod error;
pub mod gemini_cli;
pub mod google;
pub mod process;
pub mod prompt;
pub mod types;

use std::path::PathBuf;

pub use error::RecordError;
pub use types::{Backend, BackendInfo, Recommendation, RecommendationInput, RecommendationKind};

pub type Result<T> = std::result::Result<T, RecordError>;

/// Configured entry point for recommendations.
#[derive(Debug, Clone)]
pub struct Recorder {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    gemini: Option<PathBuf>,
    workspace: gemini_cli::Workspace,
}

impl Recorder {
    /// `root` is the project whose `.agelum/` holds the skill file and the
    /// snapshot scratch file. The `gemini` binary is looked up on PATH.
    pub fn new(root: impl Into<PathBuf>, api_key: Option<String>) -> Self {
        let root = root.into();
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: google::DEFAULT_BASE_URL.to_string(),
            gemini: which::which("gemini").ok(),
            workspace: gemini_cli::Workspace::under(&root),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_gemini(mut self, exe: Option<PathBuf>) -> Self {
        self.gemini = exe;
        self
    }

    /// Backends usable right now: the HTTP API when a key is set, the CLI
    /// when the binary exists.
    pub fn backends(&self) -> Vec<BackendInfo> {
        let mut out = Vec::new();
        if self.api_key.is_some() {
            out.push(Backend::GoogleApi.info());
        }
        if self.gemini.is_some() {
            out.push(Backend::GeminiCli.info());
        }
        out
    }

    pub async fn recommend(&self, input: &RecommendationInput) -> Result<Recommendation> {
        if !input.deterministic {
            let exe = self.gemini_exe();
            return gemini_cli::execute_instruction(
                &exe,
                &self.workspace,
                &input.snapshot,
                &input.prompt,
            )
            .await;
        }

        match input.backend.parse::<Backend>()? {
            Backend::GoogleApi => {
                let key = self.api_key.as_deref().ok_or(RecordError::MissingApiKey)?;
                google::recommend(&self.http, &self.base_url, key, input).await
            }
            Backend::GeminiCli => {
                let exe = self.gemini_exe();
                gemini_cli::recommend_command(&exe, &self.workspace, &input.snapshot, &input.prompt)
                    .await
            }
        }
    }

    /// Unresolved binaries fall back to a bare `gemini` so the spawn error
    /// names the missing program.
    fn gemini_exe(&self) -> PathBuf {
        self.gemini.clone().unwrap_or_else(|| PathBuf::from("gemini"))
    }
}
