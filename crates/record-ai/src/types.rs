use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RecordError;

/// Model backends a recommendation can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "google-api")]
    GoogleApi,
    #[serde(rename = "gemini-cli")]
    GeminiCli,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::GoogleApi => "google-api",
            Backend::GeminiCli => "gemini-cli",
        }
    }

    pub fn info(self) -> BackendInfo {
        let (label, model) = match self {
            Backend::GoogleApi => ("Google AI API", crate::google::MODEL),
            Backend::GeminiCli => ("Gemini CLI", "gemini-cli"),
        };
        BackendInfo {
            id: self,
            label: label.to_string(),
            model: model.to_string(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google-api" => Ok(Backend::GoogleApi),
            "gemini-cli" => Ok(Backend::GeminiCli),
            other => Err(RecordError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub id: Backend,
    pub label: String,
    pub model: String,
}

/// What the recorder knows when the user types an instruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub snapshot: String,
    pub prompt: String,
    /// Base64 PNG without the `data:` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub deterministic: bool,
    /// Kept as a string so unknown names surface as `UnknownBackend`.
    pub backend: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Command,
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub command: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub explanation: String,
    pub step_description: String,
}

impl Recommendation {
    /// A step that replays `prompt` through a model at run time.
    pub fn replay(prompt: &str) -> Self {
        Self {
            kind: RecommendationKind::Prompt,
            command: String::new(),
            args: Vec::new(),
            instruction: Some(prompt.to_string()),
            explanation: format!("AI executed: {prompt}"),
            step_description: prompt.to_string(),
        }
    }
}
