//! Minimal frontmatter handling for markdown item files.
//!
//! A frontmatter block is the text between a leading `---\n` and the next
//! `\n---`. Blocks are parsed as YAML when they are valid; hand-written files
//! often are not (`title: Fix: login`), so a line-based `key: value` reader is
//! used as a fallback.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn block_re() -> &'static Regex {
    BLOCK_RE.get_or_init(|| Regex::new(r"^---\n([\s\S]*?)\n---\n?").unwrap())
}

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*#[ \t]+(.+?)[ \t]*$").unwrap())
}

/// Split `content` into (frontmatter block, body). `None` when there is no block.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let caps = block_re().captures(content)?;
    let block = caps.get(1)?.as_str();
    let end = caps.get(0)?.end();
    Some((block, &content[end..]))
}

pub fn has_frontmatter(content: &str) -> bool {
    block_re().is_match(content)
}

/// Body of the file with any frontmatter block removed.
pub fn body(content: &str) -> &str {
    split(content).map(|(_, b)| b).unwrap_or(content)
}

/// Parse a frontmatter block into trimmed string fields.
pub fn parse_fields(block: &str) -> BTreeMap<String, String> {
    match serde_yaml::from_str::<serde_yaml::Mapping>(block) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(k, v)| Some((scalar_to_string(&k)?, scalar_to_string(&v)?)))
            .collect(),
        Err(_) => parse_lines(block),
    }
}

/// Fields of the file's frontmatter, empty when it has none.
pub fn fields(content: &str) -> BTreeMap<String, String> {
    split(content)
        .map(|(block, _)| parse_fields(block))
        .unwrap_or_default()
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.trim().to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_lines(block: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(' ') {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        out.entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
    out
}

/// Render `key: value` pairs as a frontmatter block (with trailing newline).
pub fn render(fields: &[(&str, String)]) -> String {
    let mut out = String::from("---\n");
    for (key, value) in fields {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str("---\n");
    out
}

/// Drop every `key:` line from the frontmatter block.
pub fn remove_field(content: &str, key: &str) -> String {
    let Some((block, rest)) = split(content) else {
        return content.to_string();
    };
    let prefix = format!("{key}:");
    let kept: Vec<&str> = block
        .lines()
        .filter(|l| !l.trim_start().starts_with(&prefix))
        .collect();
    format!("---\n{}\n---\n{rest}", kept.join("\n"))
}

/// Replace the `key:` line, or insert it at the top of the block.
/// Content without a block is returned unchanged.
pub fn set_field(content: &str, key: &str, value: &str) -> String {
    let Some((block, rest)) = split(content) else {
        return content.to_string();
    };
    let prefix = format!("{key}:");
    let line = format!("{key}: {value}");
    let mut replaced = false;
    let mut lines: Vec<String> = block
        .lines()
        .map(|l| {
            if !replaced && l.trim_start().starts_with(&prefix) {
                replaced = true;
                line.clone()
            } else {
                l.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.insert(0, line);
    }
    format!("---\n{}\n---\n{rest}", lines.join("\n"))
}

/// First `# heading` of the body.
pub fn heading(content: &str) -> Option<String> {
    heading_re()
        .captures(body(content))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Body text after the first `# heading`, trimmed.
pub fn body_text(content: &str) -> String {
    heading_re().replace(body(content), "").trim().to_string()
}

pub fn has_heading(text: &str) -> bool {
    heading_re().is_match(text)
}

/// Replace the first `# heading` of the body with `# <title>`, or insert one
/// right after the frontmatter block.
pub fn set_heading(content: &str, title: &str) -> String {
    let start = block_re()
        .find(content)
        .map(|m| m.end())
        .unwrap_or(0);
    let (prefix, body) = content.split_at(start);

    match heading_re().find(body) {
        Some(m) => format!(
            "{prefix}{}# {title}{}",
            &body[..m.start()],
            &body[m.end()..]
        ),
        None => {
            let sep = if !prefix.is_empty() && !prefix.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            format!("{prefix}{sep}\n# {title}\n\n{}", body.trim_start())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
