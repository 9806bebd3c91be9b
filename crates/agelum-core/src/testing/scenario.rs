use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields shared by every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// One browser test step, stored as `{"action": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    #[serde(flatten)]
    pub meta: StepMeta,
    #[serde(flatten)]
    pub action: StepAction,
}

impl From<StepAction> for TestStep {
    fn from(action: StepAction) -> Self {
        Self {
            meta: StepMeta::default(),
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitKind {
    Element,
    Text,
    Url,
    Time,
}

/// Strings for element/text/url waits, milliseconds for time waits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaitValue {
    Number(u64),
    Text(String),
}

impl fmt::Display for WaitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitValue::Number(n) => write!(f, "{n}"),
            WaitValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StepAction {
    Open {
        url: String,
    },
    Wait {
        #[serde(rename = "type")]
        kind: WaitKind,
        value: WaitValue,
    },
    SetViewport {
        width: u32,
        height: u32,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
    },
    Select {
        selector: String,
        option: String,
    },
    Check {
        selector: String,
    },
    Hover {
        selector: String,
    },
    Press {
        key: String,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<i64>,
    },
    Snapshot,
    /// Uses the step's `name` as the screenshot name.
    Screenshot,
    Prompt {
        instruction: String,
    },
    VerifyVisible {
        selector: String,
    },
    /// A raw `agent-browser` command recorded by the recorder.
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Open { .. } => "open",
            StepAction::Wait { .. } => "wait",
            StepAction::SetViewport { .. } => "setViewport",
            StepAction::Click { .. } => "click",
            StepAction::Type { .. } => "type",
            StepAction::Select { .. } => "select",
            StepAction::Check { .. } => "check",
            StepAction::Hover { .. } => "hover",
            StepAction::Press { .. } => "press",
            StepAction::Scroll { .. } => "scroll",
            StepAction::Snapshot => "snapshot",
            StepAction::Screenshot => "screenshot",
            StepAction::Prompt { .. } => "prompt",
            StepAction::VerifyVisible { .. } => "verifyVisible",
            StepAction::Command { .. } => "command",
        }
    }
}

/// Contents of a test file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `agent-browser` arguments that replay `step`. Prompt steps need a model
/// and have no direct command.
pub fn browser_args(step: &TestStep) -> Option<Vec<String>> {
    let s = |v: &str| v.to_string();
    let args = match &step.action {
        StepAction::Open { url } => vec![s("open"), url.clone()],
        StepAction::Wait { kind, value } => match kind {
            WaitKind::Element => vec![s("wait"), value.to_string()],
            WaitKind::Text => vec![s("wait"), s("--text"), value.to_string()],
            WaitKind::Url => vec![s("wait"), s("--url"), value.to_string()],
            WaitKind::Time => vec![s("wait"), value.to_string()],
        },
        StepAction::SetViewport { width, height } => {
            vec![s("set"), s("viewport"), width.to_string(), height.to_string()]
        }
        StepAction::Click { selector } => vec![s("click"), selector.clone()],
        StepAction::Type { selector, text } => vec![s("type"), selector.clone(), text.clone()],
        StepAction::Select { selector, option } => {
            vec![s("select"), selector.clone(), option.clone()]
        }
        StepAction::Check { selector } => vec![s("check"), selector.clone()],
        StepAction::Hover { selector } => vec![s("hover"), selector.clone()],
        StepAction::Press { key } => vec![s("press"), key.clone()],
        StepAction::Scroll { target, x, y } => match (target, x, y) {
            (Some(t), _, _) => vec![s("scrollintoview"), t.clone()],
            (None, _, Some(dy)) if *dy < 0 => vec![s("scroll"), s("up"), dy.abs().to_string()],
            (None, _, Some(dy)) => vec![s("scroll"), s("down"), dy.to_string()],
            (None, Some(dx), None) if *dx < 0 => {
                vec![s("scroll"), s("left"), dx.abs().to_string()]
            }
            (None, Some(dx), None) => vec![s("scroll"), s("right"), dx.to_string()],
            (None, None, None) => vec![s("scroll"), s("down")],
        },
        StepAction::Snapshot => vec![s("snapshot")],
        StepAction::Screenshot => match &step.meta.name {
            Some(name) => vec![s("screenshot"), format!("{}.png", sanitize_shot_name(name))],
            None => vec![s("screenshot")],
        },
        StepAction::Prompt { .. } => return None,
        StepAction::VerifyVisible { selector } => vec![s("is"), s("visible"), selector.clone()],
        StepAction::Command { command, args } => {
            let mut v = vec![command.clone()];
            v.extend(args.iter().cloned());
            v
        }
    };
    Some(args)
}

fn sanitize_shot_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
