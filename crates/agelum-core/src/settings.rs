//! User settings (`~/.agelum/user-settings.json`) and project resolution.
//!
//! Settings are stored as camelCase JSON so files written by other Agelum
//! frontends load unchanged. Keys this crate doesn't model are kept in
//! `extra` and written back on save.

use crate::error::{AgelumError, Result};
use crate::io::{atomic_write, write_json};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const GOOGLE_KEY_ENV: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
pub const DEFAULT_TEST_RUNNER: &str = "npx tsx packages/test-engine/src/runner.ts";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    #[default]
    Project,
    /// A container whose subdirectories are each a project.
    Folder,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub kind: ProjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<ProjectCommands>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_run: Option<bool>,
}

impl ProjectConfig {
    /// The command used to start the dev server.
    pub fn dev_command(&self) -> String {
        self.commands
            .as_ref()
            .and_then(|c| c.dev.clone())
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "pnpm dev".to_string())
    }
}

/// Per-project overrides stored in `<project>/.agelum/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<ProjectCommands>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_run: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub projects: Vec<ProjectConfig>,
    pub workflows: Vec<WorkflowConfig>,
    pub active_workflow: String,
    pub create_branch_per_task: bool,
    pub google_api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_runner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_browser_path: Option<PathBuf>,
    /// Directory whose children are tried when a repo name matches no project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_git_directory: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            workflows: Vec::new(),
            active_workflow: "default".to_string(),
            create_branch_per_task: false,
            google_api_key: String::new(),
            test_runner: None,
            agent_browser_path: None,
            root_git_directory: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl UserSettings {
    pub fn test_runner(&self) -> &str {
        self.test_runner
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_TEST_RUNNER)
    }

    /// Fill empty keys from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.google_api_key.is_empty() {
            if let Some(key) = lookup(GOOGLE_KEY_ENV).filter(|k| !k.is_empty()) {
                self.google_api_key = key;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Reads and writes settings under an Agelum home directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    home: PathBuf,
}

impl SettingsStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Store rooted at `$AGELUM_HOME` or `~/.agelum`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(paths::agelum_home()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home.join(paths::USER_SETTINGS_FILE)
    }

    /// Settings with env backfill and per-project overrides applied.
    /// A missing file yields defaults.
    pub fn load(&self) -> Result<UserSettings> {
        let mut settings = self.load_stored()?;
        settings.apply_env(|k| std::env::var(k).ok());
        Ok(settings)
    }

    /// Settings as written on disk plus project overrides, without env
    /// backfill. Read-modify-write paths start here so environment values are
    /// never persisted.
    fn load_stored(&self) -> Result<UserSettings> {
        let path = self.settings_path();
        let mut settings: UserSettings = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => UserSettings::default(),
            Err(e) => return Err(e.into()),
        };
        for project in &mut settings.projects {
            if project.kind == ProjectKind::Project && !project.path.as_os_str().is_empty() {
                apply_project_config(project);
            }
        }
        Ok(settings)
    }

    /// Save settings. Project-specific fields go to each project's own
    /// `config.json` and are stripped from the global file.
    pub fn save(&self, settings: &UserSettings) -> Result<()> {
        let mut global = settings.clone();
        for project in &mut global.projects {
            if project.kind != ProjectKind::Project || project.path.as_os_str().is_empty() {
                continue;
            }
            let overrides = ProjectOverrides {
                workflow_id: project.workflow_id.take(),
                commands: project.commands.take(),
                url: project.url.take(),
                auto_run: project.auto_run.take(),
            };
            let config_path = paths::project_config_path(&project.path);
            if overrides == ProjectOverrides::default() && !config_path.exists() {
                continue;
            }
            if let Err(e) = write_json(&config_path, &overrides) {
                tracing::warn!(project = %project.name, error = %e, "failed to save project config");
            }
        }

        let path = self.settings_path();
        let data = serde_json::to_string_pretty(&global)?;
        atomic_write(&path, data.as_bytes())?;
        restrict_permissions(&path)?;
        Ok(())
    }

    /// Shallow-merge the top-level keys of `patch` (camelCase, as stored)
    /// into the saved settings.
    pub fn update(&self, patch: serde_json::Map<String, serde_json::Value>) -> Result<UserSettings> {
        let mut current = match serde_json::to_value(self.load_stored()?)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        current.extend(patch);
        let merged: UserSettings = serde_json::from_value(serde_json::Value::Object(current))
            .map_err(|e| AgelumError::InvalidSettings(e.to_string()))?;
        self.save(&merged)?;
        self.load()
    }

    /// Overwrite the settings file with defaults.
    pub fn reset(&self) -> Result<UserSettings> {
        self.save(&UserSettings::default())?;
        tracing::info!(path = %self.settings_path().display(), "reset user settings");
        self.load()
    }

    /// Register a directory as a project, or as a folder whose children are
    /// projects. The name defaults to the directory name.
    pub fn add_project(
        &self,
        path: &Path,
        name: Option<&str>,
        kind: ProjectKind,
    ) -> Result<ProjectConfig> {
        let path = std::fs::canonicalize(path)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| AgelumError::NotADirectory(path.display().to_string()))?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .ok_or_else(|| AgelumError::InvalidId(path.display().to_string()))?;
        paths::validate_id(&name)?;

        let mut settings = self.load_stored()?;
        if settings.projects.iter().any(|p| p.id == name || p.name == name) {
            return Err(AgelumError::ProjectExists(name));
        }
        let project = ProjectConfig {
            id: name.clone(),
            name,
            path,
            kind,
            ..ProjectConfig::default()
        };
        settings.projects.push(project.clone());
        self.save(&settings)?;
        tracing::info!(project = %project.name, path = %project.path.display(), "added repository");
        Ok(project)
    }

    /// Drop a configured project or folder by id or name. Files on disk are
    /// left alone.
    pub fn remove_project(&self, name: &str) -> Result<ProjectConfig> {
        let mut settings = self.load_stored()?;
        let pos = settings
            .projects
            .iter()
            .position(|p| p.id == name || p.name == name)
            .ok_or_else(|| AgelumError::RepositoryNotFound(name.to_string()))?;
        let removed = settings.projects.remove(pos);
        self.save(&settings)?;
        tracing::info!(project = %removed.name, "removed repository");
        Ok(removed)
    }

    /// Find a project by name: configured projects first, then subdirectories
    /// of folder entries, then `root_git_directory/<name>`.
    pub fn resolve_project(&self, name: &str) -> Result<ProjectConfig> {
        let settings = self.load()?;
        resolve_in(&settings, name)
    }

    /// Configured projects plus every subdirectory of folder entries.
    pub fn list_repositories(&self) -> Result<Vec<ProjectConfig>> {
        let settings = self.load()?;
        let mut out = Vec::new();
        for project in &settings.projects {
            match project.kind {
                ProjectKind::Project => out.push(project.clone()),
                ProjectKind::Folder => {
                    let entries = match std::fs::read_dir(&project.path) {
                        Ok(e) => e,
                        Err(e) => {
                            tracing::warn!(folder = %project.path.display(), error = %e, "cannot read folder");
                            continue;
                        }
                    };
                    let mut children: Vec<ProjectConfig> = entries
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                        .filter_map(|e| {
                            let name = e.file_name().to_string_lossy().into_owned();
                            (!name.starts_with('.')).then(|| folder_child(project, &name))
                        })
                        .collect();
                    children.sort_by(|a, b| a.name.cmp(&b.name));
                    out.extend(children);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn folder_child(folder: &ProjectConfig, name: &str) -> ProjectConfig {
    let mut child = ProjectConfig {
        id: format!("{}/{name}", folder.id),
        name: name.to_string(),
        path: folder.path.join(name),
        kind: ProjectKind::Project,
        ..ProjectConfig::default()
    };
    apply_project_config(&mut child);
    child
}

pub fn resolve_in(settings: &UserSettings, name: &str) -> Result<ProjectConfig> {
    if let Some(p) = settings
        .projects
        .iter()
        .find(|p| p.kind == ProjectKind::Project && (p.name == name || p.id == name))
    {
        if !p.path.is_dir() {
            return Err(AgelumError::NotADirectory(p.path.display().to_string()));
        }
        return Ok(p.clone());
    }

    // `<folder id>/<child>` names one folder; a bare child name takes the
    // first folder that has it.
    let (folder_id, child_name) = match name.rsplit_once('/') {
        Some((prefix, child)) => (Some(prefix), child),
        None => (None, name),
    };
    if paths::validate_id(child_name).is_ok() {
        let folder = settings
            .projects
            .iter()
            .filter(|p| p.kind == ProjectKind::Folder)
            .filter(|p| folder_id.is_none_or(|id| p.id == id || p.name == id))
            .find(|p| p.path.join(child_name).is_dir());
        if let Some(folder) = folder {
            return Ok(folder_child(folder, child_name));
        }
    }

    if let Some(git_root) = &settings.root_git_directory {
        let candidate = git_root.join(name);
        if paths::validate_id(name).is_ok() && candidate.is_dir() {
            let mut project = ProjectConfig {
                id: name.to_string(),
                name: name.to_string(),
                path: candidate,
                ..ProjectConfig::default()
            };
            apply_project_config(&mut project);
            return Ok(project);
        }
    }

    Err(AgelumError::RepositoryNotFound(name.to_string()))
}

// ---------------------------------------------------------------------------
// Project config
// ---------------------------------------------------------------------------

/// Merge `<project>/.agelum/config.json` into `project` and detect its URL
/// when none is set. Unreadable config is logged and ignored.
pub fn apply_project_config(project: &mut ProjectConfig) {
    match read_project_overrides(&project.path) {
        Ok(Some(o)) => {
            if o.workflow_id.is_some() {
                project.workflow_id = o.workflow_id;
            }
            if o.commands.is_some() {
                project.commands = o.commands;
            }
            if o.url.is_some() {
                project.url = o.url;
            }
            if o.auto_run.is_some() {
                project.auto_run = o.auto_run;
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(project = %project.path.display(), error = %e, "invalid project config");
        }
    }
    if project.url.is_none() {
        project.url = detect_url(&project.path);
    }
}

pub fn read_project_overrides(project_path: &Path) -> Result<Option<ProjectOverrides>> {
    let path = paths::project_config_path(project_path);
    match std::fs::read_to_string(&path) {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A project's own config with the URL detected when it sets none.
pub fn project_overrides(project_path: &Path) -> Result<ProjectOverrides> {
    let mut config = read_project_overrides(project_path)?.unwrap_or_default();
    if config.url.is_none() {
        config.url = detect_url(project_path);
    }
    Ok(config)
}

pub fn write_project_overrides(project_path: &Path, config: &ProjectOverrides) -> Result<()> {
    write_json(&paths::project_config_path(project_path), config)
}

static PORT_RE: OnceLock<Regex> = OnceLock::new();

/// Guess the dev server URL from `package.json` scripts (`dev`, else `start`).
pub fn detect_url(project_path: &Path) -> Option<String> {
    let data = std::fs::read_to_string(project_path.join("package.json")).ok()?;
    let pkg: serde_json::Value = serde_json::from_str(&data).ok()?;
    let scripts = pkg.get("scripts")?;
    let script = scripts
        .get("dev")
        .and_then(|v| v.as_str())
        .or_else(|| scripts.get("start").and_then(|v| v.as_str()))
        .unwrap_or("");
    url_from_script(script)
}

pub fn url_from_script(script: &str) -> Option<String> {
    let re = PORT_RE.get_or_init(|| Regex::new(r"(?:-p|--port)\s+(\d+)").unwrap());
    if let Some(port) = re.captures(script).and_then(|c| c.get(1)) {
        return Some(format!("http://localhost:{}/", port.as_str()));
    }
    if script.contains("next dev") || script.contains("next start") {
        return Some("http://localhost:3000/".to_string());
    }
    if script.contains("vite") {
        return Some("http://localhost:5173/".to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
