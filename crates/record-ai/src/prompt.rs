//! Prompt text and model-output parsing.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::types::{Recommendation, RecommendationKind};
use crate::{RecordError, Result};

/// System instruction for the HTTP backend, which sees the snapshot inline.
pub const API_SYSTEM_PROMPT: &str = "Translate the browser instruction into a JSON agent-browser command.
Given the DOM snapshot and instruction, return ONLY valid JSON:
{
  \"command\": \"click\",
  \"args\": [\"#selector\"],
  \"explanation\": \"Brief description\",
  \"stepDescription\": \"Human-readable step\"
}
Use CSS selectors (id, data-testid, class-based) for deterministic, repeatable steps. No @ref references.";

const CLI_SYSTEM_PROMPT: &str = "You are a browser automation agent. Translate the user instruction into a JSON command for the \"agelum browser\" tool.

Resources:
- Skill definition: {{SKILL_PATH}}
- Current Page Snapshot: {{SNAPSHOT_PATH}}

Steps:
1. Read the snapshot file to learn the current page state.
2. Use the skill definition to pick the \"agelum browser\" command (for example \"click\", \"fill\", \"open\", \"type\", \"press\").
3. Work out the arguments. Prefer CSS selectors (id, data-testid) over @ref.
4. Answer with this JSON only:

{
  \"command\": \"click\",
  \"args\": [\"#selector\"],
  \"explanation\": \"Why this element was chosen\",
  \"stepDescription\": \"Human-readable step\"
}
";

/// User turn for the HTTP backend.
pub fn api_user_text(snapshot: &str, prompt: &str) -> String {
    format!("DOM Snapshot:\n{snapshot}\n\nUser instruction: {prompt}")
}

/// Full stdin prompt for a deterministic `gemini` run that reads the
/// snapshot and skill from disk.
pub fn cli_command_prompt(skill: &Path, snapshot: &Path, prompt: &str) -> String {
    let system = CLI_SYSTEM_PROMPT
        .replace("{{SKILL_PATH}}", &skill.display().to_string())
        .replace("{{SNAPSHOT_PATH}}", &snapshot.display().to_string());
    format!("{system}\n\nUser instruction: {prompt}")
}

/// Prompt for a free-form `gemini` run that drives the browser itself.
pub fn cli_execute_prompt(skill: &Path, snapshot: &Path, prompt: &str) -> String {
    format!(
        "You are a browser automation agent. Execute browser commands using the agelum CLI tool.

Skill reference (available commands): {}
Current page snapshot: {}

Read the snapshot file to understand the current page state, then run the agelum CLI commands that accomplish this instruction:

{prompt}

Take a new snapshot after interactions when needed.",
        skill.display(),
        snapshot.display()
    )
}

static FENCE_OPEN_RE: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE_RE: OnceLock<Regex> = OnceLock::new();
static JSON_OBJECT_RE: OnceLock<Regex> = OnceLock::new();

fn fence_open() -> &'static Regex {
    FENCE_OPEN_RE.get_or_init(|| Regex::new(r"^```(?:json)?\n?").unwrap())
}

fn fence_close() -> &'static Regex {
    FENCE_CLOSE_RE.get_or_init(|| Regex::new(r"\n?```$").unwrap())
}

fn json_object() -> &'static Regex {
    JSON_OBJECT_RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").unwrap())
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let open = fence_open().replace(trimmed, "");
    fence_close().replace(&open, "").into_owned()
}

/// Parse a model answer into a command recommendation.
///
/// Accepts bare JSON, fenced JSON, JSON embedded in prose, and the
/// `{"response": "..."}` envelope that `gemini -o json` wraps answers in.
pub fn parse_recommendation(output: &str) -> Result<Recommendation> {
    let cleaned = strip_fences(output);
    let candidate = json_object()
        .find(&cleaned)
        .map(|m| m.as_str())
        .unwrap_or(&cleaned);
    let mut value: Value = serde_json::from_str(candidate).map_err(|source| RecordError::Parse {
        output: output.to_string(),
        source,
    })?;

    if value.get("command").is_none() {
        if let Some(inner) = value.get("response").and_then(Value::as_str) {
            let inner = inner.to_string();
            return parse_recommendation(&inner);
        }
    }

    Ok(from_value(value.take()))
}

fn from_value(value: Value) -> Recommendation {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let args = match value.get("args") {
        Some(Value::Array(items)) => items.iter().map(stringify).collect(),
        _ => Vec::new(),
    };
    let explanation = text("explanation");
    let step_description = match text("stepDescription") {
        s if s.is_empty() => explanation.clone(),
        s => s,
    };
    Recommendation {
        kind: RecommendationKind::Command,
        command: text("command"),
        args,
        instruction: None,
        explanation,
        step_description,
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {} "), "{}");
    }

    #[test]
    fn parses_fenced_answer_and_stringifies_args() {
        let out = "```json\n{\"command\":\"scroll\",\"args\":[\"down\", 300],\"explanation\":\"reach footer\"}\n```";
        let r = parse_recommendation(out).unwrap();
        assert_eq!(r.kind, RecommendationKind::Command);
        assert_eq!(r.command, "scroll");
        assert_eq!(r.args, ["down", "300"]);
        assert_eq!(r.step_description, "reach footer");
    }

    #[test]
    fn finds_json_inside_prose() {
        let out = "Sure! Here it is:\n{\"command\":\"click\",\"args\":[\"#login\"],\"explanation\":\"x\",\"stepDescription\":\"Click login\"}\nDone.";
        let r = parse_recommendation(out).unwrap();
        assert_eq!(r.args, ["#login"]);
        assert_eq!(r.step_description, "Click login");
    }

    #[test]
    fn unwraps_cli_response_envelope() {
        let inner = r##"{"command":"fill","args":["#email","a@b.c"],"explanation":"e"}"##;
        let out = serde_json::json!({ "response": inner, "stats": {} }).to_string();
        let r = parse_recommendation(&out).unwrap();
        assert_eq!(r.command, "fill");
        assert_eq!(r.args.len(), 2);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_recommendation("no json here").unwrap_err();
        assert!(matches!(err, RecordError::Parse { .. }));
    }

    #[test]
    fn cli_prompt_embeds_paths_and_instruction() {
        let p = cli_command_prompt(
            Path::new("/p/.agelum/ai/skills/agent-browser.md"),
            Path::new("/p/.agelum/temp/snapshot.txt"),
            "open settings",
        );
        assert!(p.contains("Skill definition: /p/.agelum/ai/skills/agent-browser.md"));
        assert!(p.contains("Current Page Snapshot: /p/.agelum/temp/snapshot.txt"));
        assert!(p.ends_with("User instruction: open settings"));
    }
}
