//! Browser test storage under `.agelum/work/tests`.
//!
//! Indexed tests live at `<group>/<folder>/test.json` and are listed in
//! `index.json`; older tests are flat `<id>.json` files next to the index.

use super::scenario::{TestScenario, TestStep};
use crate::error::{AgelumError, Result};
use crate::io::{atomic_write, ensure_dir, write_json};
use crate::naming::{now_millis, slugify};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_GROUPS: &[&str] = &["LOGIN", "NAVIGATION", "REGRESSION", "FEATURES", "EXPERIMENTAL"];
pub const DEFAULT_GROUP: &str = "FEATURES";

const TEST_FILE: &str = "test.json";
const RUNS_DIR_NAME: &str = "runs";
/// File stem of `index.json`; no flat test may take it.
const INDEX_STEM: &str = "index";

/// Serializes read-modify-write cycles on `index.json`.
static INDEX_LOCK: Mutex<()> = Mutex::new(());

fn lock_index() -> MutexGuard<'static, ()> {
    INDEX_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestIndexEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default)]
    pub steps_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set when a flat test file could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A test as returned to callers: its id, location and contents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub path: PathBuf,
    #[serde(flatten)]
    pub scenario: TestScenario,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

pub fn load_index(root: &Path) -> Result<Vec<TestIndexEntry>> {
    let path = paths::test_index_path(root);
    match std::fs::read_to_string(&path) {
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn save_index(root: &Path, index: &[TestIndexEntry]) -> Result<()> {
    write_json(&paths::test_index_path(root), &index)
}

fn index_entry(root: &Path, id: &str) -> Result<Option<TestIndexEntry>> {
    Ok(load_index(root)?.into_iter().find(|e| e.id == id))
}

/// Display name for a test: the indexed name, else the id.
pub fn test_name(root: &Path, id: &str) -> String {
    index_entry(root, id)
        .ok()
        .flatten()
        .map(|e| e.name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string())
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Group directories, creating any missing default group first.
pub fn list_groups(root: &Path) -> Result<Vec<String>> {
    let dir = paths::tests_dir(root);
    ensure_dir(&dir)?;

    let existing = group_dirs(&dir)?;
    for group in DEFAULT_GROUPS {
        if !existing.iter().any(|g| g.eq_ignore_ascii_case(group)) {
            ensure_dir(&dir.join(group))?;
        }
    }
    let mut groups = group_dirs(&dir)?;
    groups.sort();
    Ok(groups)
}

fn group_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && !name.starts_with('.') && name != RUNS_DIR_NAME {
            out.push(name);
        }
    }
    Ok(out)
}

/// Group names share the tests directory with `runs/` and hidden dirs, which
/// are never listed as groups.
fn validate_group(name: &str) -> Result<()> {
    paths::validate_id(name)?;
    if name == RUNS_DIR_NAME || name.starts_with('.') {
        return Err(AgelumError::InvalidId(name.to_string()));
    }
    Ok(())
}

fn validate_test_id(id: &str) -> Result<()> {
    paths::validate_id(id)?;
    if id == INDEX_STEM {
        return Err(AgelumError::InvalidId(id.to_string()));
    }
    Ok(())
}

pub fn create_group(root: &Path, name: &str) -> Result<String> {
    let name = name.trim();
    validate_group(name)?;
    ensure_dir(&paths::tests_dir(root).join(name))?;
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Path of a test's JSON file: the indexed location when present on disk,
/// else the flat `<id>.json`.
pub fn resolve_test_path(root: &Path, id: &str) -> Result<PathBuf> {
    validate_test_id(id)?;
    let dir = paths::tests_dir(root);
    if let Some(entry) = index_entry(root, id)? {
        if let (Some(group), Some(folder)) = (&entry.group, &entry.folder) {
            let p = dir.join(group).join(folder).join(TEST_FILE);
            if p.is_file() {
                return Ok(p);
            }
        }
    }
    let flat = dir.join(format!("{id}.json"));
    if flat.is_file() {
        return Ok(flat);
    }
    Err(AgelumError::TestNotFound(id.to_string()))
}

fn read_scenario(path: &Path) -> Result<TestScenario> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| AgelumError::InvalidTest(format!("{}: {e}", path.display())))
}

pub fn list(root: &Path) -> Result<Vec<TestIndexEntry>> {
    let dir = paths::tests_dir(root);
    ensure_dir(&dir)?;
    let mut out = load_index(root)?;

    let index_file = paths::test_index_path(root);
    let mut flat = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if path == index_file || !entry.file_type()?.is_file() {
            continue;
        }
        let Some(id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".json"))
        else {
            continue;
        };
        if out.iter().any(|e| e.id == id) {
            continue;
        }
        let updated_at = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let listed = match read_scenario(&path) {
            Ok(sc) => TestIndexEntry {
                id: id.to_string(),
                name: sc.name,
                group: None,
                folder: None,
                steps_count: sc.steps.len(),
                updated_at,
                description: sc.description,
                error: None,
            },
            Err(_) => TestIndexEntry {
                id: id.to_string(),
                name: entry.file_name().to_string_lossy().into_owned(),
                group: None,
                folder: None,
                steps_count: 0,
                updated_at,
                description: None,
                error: Some("Invalid JSON".to_string()),
            },
        };
        flat.push(listed);
    }
    flat.sort_by(|a, b| a.id.cmp(&b.id));
    out.extend(flat);
    Ok(out)
}

pub fn get(root: &Path, id: &str) -> Result<TestRecord> {
    let path = resolve_test_path(root, id)?;
    let scenario = read_scenario(&path)?;
    let group = index_entry(root, id)?.and_then(|e| e.group);
    Ok(TestRecord {
        id: id.to_string(),
        group,
        path,
        scenario,
    })
}

pub fn create(root: &Path, new: NewTest) -> Result<TestIndexEntry> {
    let name = new
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    let id = name
        .as_deref()
        .map(|n| slugify(n).trim_matches('-').to_string())
        .filter(|s| !s.is_empty())
        .map(|s| if s == INDEX_STEM { format!("{s}-test") } else { s })
        .unwrap_or_else(|| format!("test-{}", now_millis()));
    let group = new
        .group
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(DEFAULT_GROUP)
        .to_string();
    validate_group(&group)?;

    let _guard = lock_index();
    let mut index = load_index(root)?;
    let dir = paths::tests_dir(root);
    if index.iter().any(|e| e.id == id) || dir.join(format!("{id}.json")).exists() {
        return Err(AgelumError::TestExists(id));
    }

    let now = Utc::now();
    let scenario = TestScenario {
        name: name.unwrap_or_else(|| "Untitled Test".to_string()),
        description: new.description.clone(),
        steps: new.steps,
        updated_at: Some(now),
    };
    let path = dir.join(&group).join(&id).join(TEST_FILE);
    write_json(&path, &scenario)?;

    let entry = TestIndexEntry {
        id: id.clone(),
        name: scenario.name.clone(),
        group: Some(group),
        folder: Some(id),
        steps_count: scenario.steps.len(),
        updated_at: Some(now),
        description: new.description,
        error: None,
    };
    index.push(entry.clone());
    save_index(root, &index)?;
    tracing::info!(id = %entry.id, path = %path.display(), "created test");
    Ok(entry)
}

/// Replace a test's name, steps and description. Unknown ids are written as
/// a flat test file.
pub fn update(
    root: &Path,
    id: &str,
    name: &str,
    steps: Vec<TestStep>,
    description: Option<String>,
) -> Result<TestRecord> {
    validate_test_id(id)?;
    if name.trim().is_empty() {
        return Err(AgelumError::InvalidTest("name is required".to_string()));
    }
    let path = match resolve_test_path(root, id) {
        Ok(p) => p,
        Err(AgelumError::TestNotFound(_)) => paths::tests_dir(root).join(format!("{id}.json")),
        Err(e) => return Err(e),
    };
    let now = Utc::now();
    let scenario = TestScenario {
        name: name.trim().to_string(),
        description,
        steps,
        updated_at: Some(now),
    };
    let guard = lock_index();
    write_json(&path, &scenario)?;
    touch_index(root, id, |e| {
        e.name = scenario.name.clone();
        e.description = scenario.description.clone();
        e.steps_count = scenario.steps.len();
        e.updated_at = Some(now);
    })?;
    drop(guard);
    get(root, id)
}

/// Remove a test and its index entry. Missing tests are not an error.
pub fn delete(root: &Path, id: &str) -> Result<()> {
    validate_test_id(id)?;
    let dir = paths::tests_dir(root);
    let _guard = lock_index();
    let mut index = load_index(root)?;
    if let Some(pos) = index.iter().position(|e| e.id == id) {
        let entry = index.remove(pos);
        if let (Some(group), Some(folder)) = (&entry.group, &entry.folder) {
            let folder_dir = dir.join(group).join(folder);
            if folder_dir.is_dir() {
                std::fs::remove_dir_all(&folder_dir)?;
            }
        }
        save_index(root, &index)?;
    }
    let flat = dir.join(format!("{id}.json"));
    if flat.is_file() {
        std::fs::remove_file(&flat)?;
    }
    tracing::info!(id, "deleted test");
    Ok(())
}

pub fn steps(root: &Path, id: &str) -> Result<Vec<TestStep>> {
    Ok(get(root, id)?.scenario.steps)
}

/// Append a step, bumping `updatedAt` and the indexed step count.
pub fn add_step(root: &Path, id: &str, step: TestStep) -> Result<TestStep> {
    let _guard = lock_index();
    let path = resolve_test_path(root, id)?;
    let mut scenario = read_scenario(&path)?;
    let now = Utc::now();
    scenario.steps.push(step.clone());
    scenario.updated_at = Some(now);
    let data = serde_json::to_string_pretty(&scenario)?;
    atomic_write(&path, data.as_bytes())?;
    touch_index(root, id, |e| {
        e.steps_count = scenario.steps.len();
        e.updated_at = Some(now);
    })?;
    Ok(step)
}

/// Callers hold the index lock.
fn touch_index(root: &Path, id: &str, f: impl FnOnce(&mut TestIndexEntry)) -> Result<()> {
    let mut index = load_index(root)?;
    if let Some(entry) = index.iter_mut().find(|e| e.id == id) {
        f(entry);
        save_index(root, &index)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
