//! Task, epic and idea stores.
//!
//! Every item is a markdown file at `<kind root>/<state>/<id>.md`. Tasks may
//! additionally sit one level deeper, in a folder named after their epic.
//! Both the primary `.agelum/` roots and the legacy `agelum/` roots are read;
//! new items are always written to the primary root.

use crate::error::{AgelumError, Result};
use crate::frontmatter;
use crate::io::{atomic_write, ensure_dir, move_file};
use crate::item::{parse_file, NewItem, WorkItem};
use crate::naming::{
    file_id, has_timestamp_prefix, now_millis, sanitize_file_base, timestamp_prefix,
    unique_markdown_path,
};
use crate::paths;
use crate::structure::ensure_structure;
use crate::types::{ItemKind, ItemState};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// All items of `kind`, deduplicated by path and ordered by state then age.
pub fn list(root: &Path, kind: ItemKind) -> Result<Vec<WorkItem>> {
    ensure_structure(root)?;

    let mut by_path: BTreeMap<PathBuf, WorkItem> = BTreeMap::new();
    for base in roots(root, kind) {
        for (dir, state) in kind.read_dirs() {
            let state_dir = base.join(dir);
            let mut found = Vec::new();
            read_state_dir(kind, &state_dir, state, None, &mut found)?;
            for item in found {
                by_path.insert(item.path.clone(), item);
            }
        }
    }

    let order = |s: ItemState| kind.states().iter().position(|x| *x == s).unwrap_or(usize::MAX);
    let mut items: Vec<WorkItem> = by_path.into_values().collect();
    items.sort_by(|a, b| {
        order(a.state)
            .cmp(&order(b.state))
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    Ok(items)
}

/// Primary then legacy root, skipping ones that don't exist.
fn roots(root: &Path, kind: ItemKind) -> Vec<PathBuf> {
    [paths::primary_root(root, kind), paths::legacy_root(root, kind)]
        .into_iter()
        .filter(|p| p.is_dir())
        .collect()
}

fn read_state_dir(
    kind: ItemKind,
    dir: &Path,
    state: ItemState,
    epic: Option<&str>,
    out: &mut Vec<WorkItem>,
) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            // Only tasks are grouped into epic folders, one level deep.
            if kind == ItemKind::Task && epic.is_none() {
                let name = entry.file_name().to_string_lossy().into_owned();
                read_state_dir(kind, &path, state, Some(&name), out)?;
            }
        } else if file_type.is_file() && path.extension().is_some_and(|e| e == "md") {
            if let Some(item) = parse_file(kind, &path, state, epic) {
                out.push(item);
            }
        }
    }
    Ok(())
}

/// Case-insensitive search over id, title and description.
pub fn search(root: &Path, kind: ItemKind, query: &str) -> Result<Vec<WorkItem>> {
    Ok(list(root, kind)?
        .into_iter()
        .filter(|i| i.matches(query))
        .collect())
}

pub fn get(root: &Path, kind: ItemKind, id: &str) -> Result<WorkItem> {
    list(root, kind)?
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| AgelumError::ItemNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

fn resolve_state(kind: ItemKind, requested: Option<&str>) -> Result<ItemState> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => kind.parse_state(s),
        None => Ok(kind.default_state()),
    }
}

/// Create a new item file in the primary root and return it.
pub fn create(root: &Path, kind: ItemKind, new: NewItem) -> Result<WorkItem> {
    ensure_structure(root)?;
    let state = resolve_state(kind, new.state.as_deref())?;
    let state_dir = paths::primary_root(root, kind).join(state.as_str());
    ensure_dir(&state_dir)?;

    let created = Utc::now();
    let description = new.description.clone().unwrap_or_default();

    let (path, content) = match kind {
        ItemKind::Task => {
            let base = format!("{}-{}", timestamp_prefix(), sanitize_file_base(&new.title));
            let path = unique_markdown_path(&state_dir, &base);
            let id = file_id(&path);

            let mut fields = vec![("created", created.to_rfc3339()), ("state", state.to_string())];
            if let Some(a) = non_blank(&new.assignee) {
                fields.push(("assignee", a));
            }
            if let Some(r) = non_blank(&new.reporter) {
                fields.push(("reporter", r));
            }
            if let Some(p) = new.priority {
                fields.push(("priority", p.to_string()));
            }
            if let Some(s) = non_blank(&new.source_url) {
                fields.push(("source", s));
            }
            let content = format!(
                "{}\n# {id}\n\n{description}\n",
                frontmatter::render(&fields)
            );
            (path, content)
        }
        ItemKind::Epic | ItemKind::Idea => {
            let id = format!("{}-{}", kind.id_prefix(), now_millis());
            let path = unique_markdown_path(&state_dir, &id);
            let title = if new.title.trim().is_empty() {
                file_id(&path)
            } else {
                new.title.trim().to_string()
            };
            let fields = vec![
                ("title", title.clone()),
                ("created", created.to_rfc3339()),
                ("state", state.to_string()),
            ];
            let content = format!(
                "{}\n# {title}\n\n{description}\n",
                frontmatter::render(&fields)
            );
            (path, content)
        }
    };

    atomic_write(&path, content.as_bytes())?;
    tracing::info!(kind = %kind, path = %path.display(), "created item");

    parse_file(kind, &path, state, None)
        .ok_or_else(|| AgelumError::FileNotFound(path.display().to_string()))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedFile {
    pub id: String,
    pub path: PathBuf,
    pub content: String,
}

/// Create a task from caller-supplied markdown. A `# heading` is added when
/// the content has none; frontmatter is added only when missing.
pub fn create_from_content(
    root: &Path,
    state: Option<&str>,
    file_base: Option<&str>,
    content: &str,
) -> Result<CreatedFile> {
    ensure_structure(root)?;
    let state = resolve_state(ItemKind::Task, state)?;
    let state_dir = paths::primary_root(root, ItemKind::Task).join(state.as_str());
    ensure_dir(&state_dir)?;

    let base = format!(
        "{}-{}",
        timestamp_prefix(),
        sanitize_file_base(file_base.unwrap_or("untitled"))
    );
    let path = unique_markdown_path(&state_dir, &base);
    let id = file_id(&path);

    let trimmed = content.trim();
    let full = if frontmatter::has_frontmatter(trimmed) {
        let body = if frontmatter::has_heading(frontmatter::body(trimmed)) {
            trimmed.to_string()
        } else {
            frontmatter::set_heading(trimmed, &id)
        };
        format!("{body}\n")
    } else {
        let with_heading = if frontmatter::has_heading(trimmed) {
            trimmed.to_string()
        } else {
            format!("# {id}\n\n{trimmed}")
        };
        let fields = vec![
            ("created", Utc::now().to_rfc3339()),
            ("state", state.to_string()),
        ];
        format!("{}\n{with_heading}\n", frontmatter::render(&fields))
    };

    atomic_write(&path, full.as_bytes())?;
    tracing::info!(path = %path.display(), "created task from content");
    Ok(CreatedFile {
        id,
        path,
        content: full,
    })
}

/// Create the `task/<id>` git branch for a new task. Failures (no git, branch
/// exists) are logged and ignored.
pub fn create_task_branch(root: &Path, id: &str) {
    let branch = format!("task/{id}");
    match std::process::Command::new("git")
        .args(["branch", &branch])
        .current_dir(root)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) if status.success() => tracing::info!(%branch, "created task branch"),
        Ok(status) => tracing::debug!(%branch, ?status, "git branch did not succeed"),
        Err(e) => tracing::debug!(%branch, error = %e, "git not available"),
    }
}

// ---------------------------------------------------------------------------
// Moving
// ---------------------------------------------------------------------------

fn find_in_state_dir(kind: ItemKind, dir: &Path, id: &str) -> Result<Option<PathBuf>> {
    let file_name = format!("{id}.md");
    let direct = dir.join(&file_name);
    if direct.is_file() {
        return Ok(Some(direct));
    }
    if kind != ItemKind::Task || !dir.is_dir() {
        return Ok(None);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let candidate = entry.path().join(&file_name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
    }
    Ok(None)
}

/// Move an item between state columns, within whichever root holds it.
/// Returns the new path.
pub fn move_item(
    root: &Path,
    kind: ItemKind,
    id: &str,
    from: &str,
    to: &str,
) -> Result<PathBuf> {
    paths::validate_id(id)?;
    ensure_structure(root)?;
    let from_state = kind.parse_state(from)?;
    let to_state = kind.parse_state(to)?;

    // A `fixes` item may still live in a legacy `priority` folder.
    let mut from_dirs = vec![from_state.as_str()];
    if from_state == ItemState::Fixes {
        from_dirs.push("priority");
    }

    let mut found: Option<(PathBuf, PathBuf)> = None;
    'outer: for base in roots(root, kind) {
        for dir in &from_dirs {
            let state_dir = base.join(dir);
            if let Some(p) = find_in_state_dir(kind, &state_dir, id)? {
                found = Some((p, state_dir));
                break 'outer;
            }
        }
    }
    let (from_path, from_dir) = found.ok_or_else(|| AgelumError::ItemNotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    })?;
    let base = from_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::primary_root(root, kind));

    let target_name = if kind == ItemKind::Task
        && to_state == ItemState::Done
        && !has_timestamp_prefix(id)
    {
        format!("{}-{id}.md", timestamp_prefix())
    } else {
        format!("{id}.md")
    };

    let mut to_dir = base.join(to_state.as_str());
    let epic_folder = from_path
        .parent()
        .filter(|p| *p != from_dir)
        .and_then(|p| p.file_name())
        .map(|n| n.to_os_string());
    if let Some(folder) = epic_folder {
        to_dir = to_dir.join(folder);
    }
    let to_path = to_dir.join(target_name);

    if to_path != from_path {
        move_file(&from_path, &to_path)?;
    }
    tracing::info!(
        kind = %kind,
        id,
        from = %from_state,
        to = %to_state,
        "moved item"
    );
    Ok(to_path)
}

// ---------------------------------------------------------------------------
// Renaming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Renamed {
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub content: String,
}

/// Rename a task or epic file after a new title. Tasks drop any frontmatter
/// `title:` (their title is the filename); epics keep it in sync.
pub fn rename(root: &Path, kind: ItemKind, path: &str, new_title: &str) -> Result<Renamed> {
    if kind == ItemKind::Idea {
        return Err(AgelumError::InvalidKind(kind.to_string()));
    }
    let allowed = [paths::primary_root(root, kind), paths::legacy_root(root, kind)];
    let current = paths::confine(root, path, &allowed)?;
    if !current.is_file() {
        return Err(AgelumError::FileNotFound(path.to_string()));
    }

    let dir = current
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AgelumError::InvalidPath(path.to_string()))?;
    let safe = sanitize_file_base(new_title);
    let candidate = dir.join(format!("{safe}.md"));
    let target = if candidate == current {
        current.clone()
    } else {
        unique_markdown_path(&dir, &safe)
    };
    let id = file_id(&target);

    let existing = std::fs::read_to_string(&current)?;
    let (title, updated) = match kind {
        ItemKind::Task => {
            let stripped = frontmatter::remove_field(&existing, "title");
            (id.clone(), frontmatter::set_heading(&stripped, &id))
        }
        _ => {
            let title = new_title.trim().to_string();
            let with_heading = frontmatter::set_heading(&existing, &title);
            (title.clone(), frontmatter::set_field(&with_heading, "title", &title))
        }
    };

    if target != current {
        move_file(&current, &target)?;
    }
    atomic_write(&target, updated.as_bytes())?;
    tracing::info!(kind = %kind, from = %current.display(), to = %target.display(), "renamed item");

    Ok(Renamed {
        id,
        title,
        path: target,
        content: updated,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
