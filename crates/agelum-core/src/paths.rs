use crate::error::{AgelumError, Result};
use crate::types::ItemKind;
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AGELUM_DIR: &str = ".agelum";
pub const LEGACY_DIR: &str = "agelum";

pub const TASKS_DIR: &str = ".agelum/work/tasks";
pub const EPICS_DIR: &str = ".agelum/work/epics";
pub const IDEAS_DIR: &str = ".agelum/doc/ideas";
pub const DOCS_DIR: &str = ".agelum/doc/docs";
pub const PLAN_DIR: &str = ".agelum/doc/plan";
pub const COMMANDS_DIR: &str = ".agelum/ai/commands";
pub const TESTS_DIR: &str = ".agelum/work/tests";

pub const TASK_IMAGES_DIR: &str = ".agelum/work/tasks/images";
pub const TEST_RUNS_DIR: &str = ".agelum/work/tests/runs";
pub const TEST_INDEX_FILE: &str = ".agelum/work/tests/index.json";
pub const PROJECT_CONFIG_FILE: &str = ".agelum/config.json";

pub const USER_SETTINGS_FILE: &str = "user-settings.json";

/// Route prefix under which test run artifacts are served.
pub const ARTIFACTS_ROUTE: &str = "/api/tests/artifacts/";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn agelum_dir(root: &Path) -> PathBuf {
    root.join(AGELUM_DIR)
}

pub fn legacy_dir(root: &Path) -> PathBuf {
    root.join(LEGACY_DIR)
}

/// Primary storage root for a kind of work item.
pub fn primary_root(root: &Path, kind: ItemKind) -> PathBuf {
    match kind {
        ItemKind::Task => root.join(TASKS_DIR),
        ItemKind::Epic => root.join(EPICS_DIR),
        ItemKind::Idea => root.join(IDEAS_DIR),
    }
}

/// Legacy storage root (`agelum/tasks`, `agelum/epics`, `agelum/ideas`).
pub fn legacy_root(root: &Path, kind: ItemKind) -> PathBuf {
    let sub = match kind {
        ItemKind::Task => "tasks",
        ItemKind::Epic => "epics",
        ItemKind::Idea => "ideas",
    };
    legacy_dir(root).join(sub)
}

pub fn tests_dir(root: &Path) -> PathBuf {
    root.join(TESTS_DIR)
}

pub fn test_index_path(root: &Path) -> PathBuf {
    root.join(TEST_INDEX_FILE)
}

pub fn test_runs_dir(root: &Path, test_id: &str) -> PathBuf {
    root.join(TEST_RUNS_DIR).join(test_id)
}

pub fn execution_dir(root: &Path, test_id: &str, execution_id: &str) -> PathBuf {
    test_runs_dir(root, test_id).join(execution_id)
}

pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

/// `$AGELUM_HOME`, or `~/.agelum`.
pub fn agelum_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("AGELUM_HOME") {
        return Ok(PathBuf::from(dir));
    }
    home::home_dir()
        .map(|h| h.join(AGELUM_DIR))
        .ok_or(AgelumError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Ids are used verbatim as file and directory names.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
    {
        return Err(AgelumError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Lexically normalise a path (resolve `.` and `..`) without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` with symlinks resolved through its deepest existing ancestor; the
/// part that does not exist yet is appended as is.
fn real_path(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(real) = std::fs::canonicalize(existing) {
            return tail.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn strictly_inside(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir) && path != dir
}

/// Resolve `path` (absolute or relative to `root`) and require it to stay inside
/// one of `allowed` directories, both as written and after following symlinks.
pub fn confine(root: &Path, path: &str, allowed: &[PathBuf]) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = normalize(&joined);
    let real = real_path(&resolved);
    let inside = allowed.iter().map(|a| normalize(a)).any(|a| {
        strictly_inside(&resolved, &a) && strictly_inside(&real, &real_path(&a))
    });
    if !inside {
        return Err(AgelumError::InvalidPath(path.to_string()));
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
