use chrono::{DateTime, Local};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MAX_FILE_BASE: usize = 120;

static TIMESTAMP_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static UNSAFE_CHARS_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static DASHES_RE: OnceLock<Regex> = OnceLock::new();
static NON_ALNUM_RE: OnceLock<Regex> = OnceLock::new();

fn timestamp_prefix_re() -> &'static Regex {
    TIMESTAMP_PREFIX_RE.get_or_init(|| Regex::new(r"^\d{2}_\d{2}_\d{2}-\d{6}-").unwrap())
}

fn unsafe_chars_re() -> &'static Regex {
    UNSAFE_CHARS_RE.get_or_init(|| Regex::new(r#"[<>:"|?*\x00-\x1F]"#).unwrap())
}

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn dashes_re() -> &'static Regex {
    DASHES_RE.get_or_init(|| Regex::new(r"-+").unwrap())
}

fn non_alnum_re() -> &'static Regex {
    NON_ALNUM_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// `YY_MM_DD-HHMMSS`, the prefix given to task filenames.
pub fn timestamp_prefix_at(now: DateTime<Local>) -> String {
    now.format("%y_%m_%d-%H%M%S").to_string()
}

pub fn timestamp_prefix() -> String {
    timestamp_prefix_at(Local::now())
}

pub fn has_timestamp_prefix(id: &str) -> bool {
    timestamp_prefix_re().is_match(id)
}

/// Turn a free-form title into a filesystem-safe file base.
pub fn sanitize_file_base(input: &str) -> String {
    let s = input.trim().replace(['\\', '/'], "-");
    let s = unsafe_chars_re().replace_all(&s, "");
    let s = whitespace_re().replace_all(&s, "-");
    let s = dashes_re().replace_all(&s, "-");
    let s = s.trim_start_matches('.').trim_end_matches('.');
    let s: String = s.chars().take(MAX_FILE_BASE).collect();
    let s = s.trim();
    if s.is_empty() {
        "untitled".to_string()
    } else {
        s.to_string()
    }
}

/// Test ids: lowercase, runs of anything but `[a-z0-9]` become `-`.
pub fn slugify(input: &str) -> String {
    non_alnum_re()
        .replace_all(&input.to_lowercase(), "-")
        .into_owned()
}

/// File stem used as the item id (`foo.md` → `foo`).
pub fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .map(|n| n.strip_suffix(".md").unwrap_or(&n).to_string())
        .unwrap_or_default()
}

/// First free `<base>.md`, `<base>-2.md`, `<base>-3.md`… in `dir`.
pub fn unique_markdown_path(dir: &Path, base: &str) -> PathBuf {
    unique_path(dir, base, "md")
}

pub fn unique_path(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while dir.join(format!("{candidate}.{ext}")).exists() {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    dir.join(format!("{candidate}.{ext}"))
}

/// Milliseconds since the Unix epoch, used for `epic-…`, `idea-…` and `exec-…` ids.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
